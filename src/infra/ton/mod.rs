//! TON chain infrastructure: RPC provider, wallet signer, ingestion and
//! message codecs.

pub mod ingestor;
pub mod messages;
pub mod rate_limit;
pub mod rpc;
pub mod wallet;

pub use ingestor::TransactionIngestor;
pub use messages::{InboundPayload, OutboundBody};
pub use rate_limit::{RpcRateLimiter, RpcThrottleConfig};
pub use rpc::{GetMethodResult, HttpTonRpcProvider, TonRpcConfig, TonRpcProvider};
pub use wallet::{WalletConfig, WalletSigner, signing_key_from_hex};
