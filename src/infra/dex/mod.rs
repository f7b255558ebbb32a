//! Swap venue adapters.

pub mod stonfi;

pub use stonfi::{StonfiVenue, StonfiVenueConfig};
