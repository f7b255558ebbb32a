//! Outbound notification adapters.

pub mod backend;

pub use backend::HttpBackendNotifier;
