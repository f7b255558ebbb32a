//! Test utilities: mock implementations of the domain ports.

pub mod mocks;

pub use mocks::{
    MockConfig, MockLedger, MockNotifier, MockRpcProvider, MockSource, MockVenue, MockWallet,
    SentMessage,
};
