//! Infrastructure layer implementations.

pub mod database;
pub mod dex;
pub mod notify;
pub mod ton;

pub use database::{PostgresConfig, PostgresLedger};
pub use dex::{StonfiVenue, StonfiVenueConfig};
pub use notify::HttpBackendNotifier;
pub use ton::{
    HttpTonRpcProvider, TonRpcConfig, TransactionIngestor, WalletConfig, WalletSigner,
    signing_key_from_hex,
};
