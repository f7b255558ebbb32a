//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, ChainError, ConfigError, DatabaseError, SwapError, ValidationError};
pub use traits::{BackendNotifier, LedgerStore, SwapVenue, TransactionSource, WalletGateway};
pub use types::{
    CandidateTransaction, ErrorDetail, ErrorResponse, HealthReport, MessageDescriptor,
    PoolReserves, ProcessPaymentRequest, ProcessPaymentResponse, RelayerMetrics, SendConfirmation,
    SwapResultNotification, TonAddress, TransactionRecord, TransactionStatus,
};
