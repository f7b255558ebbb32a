//! Error taxonomy for the relayer.
//!
//! Errors inside a single transaction's processing never cross the pipeline
//! boundary; they end up in the record's `error_message`. Only wallet
//! initialization failure is escalated to process-level fatal.

use thiserror::Error;

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Swap error: {0}")]
    Swap(#[from] SwapError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Rate limit exceeded")]
    RateLimited,
}

impl AppError {
    /// True for errors worth retrying with backoff at the call site
    /// (network flaps and provider 5xx), false for everything that a retry
    /// cannot fix.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Chain(ChainError::Transport(_)) | Self::Chain(ChainError::Timeout(_))
        )
    }
}

/// Database-level errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => Self::NotFound(e.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate(e.to_string()),
            _ => Self::Query(e.to_string()),
        }
    }
}

/// Blockchain interaction errors
#[derive(Debug, Error)]
pub enum ChainError {
    /// Network-level failure or provider 5xx; retried with backoff
    #[error("RPC transport failed: {0}")]
    Transport(String),

    /// Error reported by the RPC endpoint itself; not retried
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("RPC request timed out: {0}")]
    Timeout(String),

    /// The message was accepted for sending but the chain-visible seqno did
    /// not advance within the bounded wait. The send may still land; callers
    /// must verify the effect independently (balance diff).
    #[error("Confirmation timed out: {0}")]
    ConfirmationTimeout(String),

    #[error("Insufficient wallet balance")]
    InsufficientFunds,

    #[error("Insufficient jetton balance: {balance} < {required}")]
    InsufficientJettons { balance: i64, required: i64 },

    #[error("Insufficient balance for refund: {balance} < {required}")]
    RefundShortfall { balance: i64, required: i64 },

    #[error("Wallet initialization failed: {0}")]
    WalletInit(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to parse chain data: {0}")]
    Parse(String),
}

/// Swap precondition and execution errors
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("Swap amount {amount} outside allowed range {min}..={max}")]
    OutOfRange { amount: i64, min: i64, max: i64 },

    #[error("Swap amount {amount} exceeds liquidity cap {cap}")]
    ExceedsReserve { amount: i64, cap: i64 },

    #[error("Pool has zero reserves")]
    ZeroReserves,

    #[error("Computed swap output is zero")]
    ZeroExpectedOutput,

    /// The swap message was sent but no jetton balance increase was observed
    /// after all polling attempts. The paid-in TON is still outstanding.
    #[error("No jetton balance increase observed after swap")]
    NoBalanceIncrease,
}

/// Request validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {0}")]
    Multiple(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}
