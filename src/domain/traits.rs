//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::AppError;
use super::types::{
    CandidateTransaction, MessageDescriptor, PoolReserves, SendConfirmation,
    SwapResultNotification, TonAddress, TransactionRecord, TransactionStatus,
};

/// Persistent ledger of relayed transactions.
///
/// The unique `(lt, hash)` constraint behind `try_create` is the only
/// cross-process deduplication primitive in the system.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Atomically admit a candidate. Returns `None` when a record with the
    /// same `(lt, hash)` already exists, in any status. New records start in
    /// `Processing`, claimed by the admitting batch.
    async fn try_create(
        &self,
        candidate: &CandidateTransaction,
    ) -> Result<Option<TransactionRecord>, AppError>;

    /// Insert a record for the synchronous processing path, starting in
    /// `Pending`. The same `(lt, hash)` dedup rule applies.
    async fn insert_pending(
        &self,
        candidate: &CandidateTransaction,
    ) -> Result<Option<TransactionRecord>, AppError>;

    /// Claim a pending record for processing.
    async fn mark_processing(&self, id: Uuid) -> Result<(), AppError>;

    /// Move a record to a terminal state. Refuses to touch records that are
    /// already terminal.
    async fn finalize(
        &self,
        id: Uuid,
        status: TransactionStatus,
        error_message: Option<&str>,
        jetton_amount: Option<i64>,
    ) -> Result<(), AppError>;

    /// Increment the retry counter, returning the new value.
    async fn increment_retry_count(&self, id: Uuid) -> Result<i32, AppError>;

    /// Look up a record by its deduplication key.
    async fn find_by_key(&self, lt: i64, hash: &str)
    -> Result<Option<TransactionRecord>, AppError>;

    /// Recent records, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<TransactionRecord>, AppError>;
}

/// The single serialized signer for the relayer wallet.
///
/// Every outgoing message (swap, burn, refund, callback) goes through this
/// one component; nothing else may touch the wallet seqno.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    /// Perform lazy one-time initialization (key derivation, address
    /// verification, initial seqno fetch). Concurrent callers share a single
    /// attempt.
    async fn ensure_initialized(&self) -> Result<(), AppError>;

    /// Submit one outgoing message, fully serialized against other sends.
    /// Blocks until the chain-visible seqno advances or the bounded wait
    /// expires; an expired wait returns `confirmed: false` rather than an
    /// error.
    async fn send(
        &self,
        dest: &TonAddress,
        value_nanotons: i64,
        body: Vec<u8>,
    ) -> Result<SendConfirmation, AppError>;

    /// Current TON balance of the relayer wallet in nanotons.
    async fn balance(&self) -> Result<i64, AppError>;

    /// Current jetton balance of the relayer's jetton wallet.
    async fn jetton_balance(&self) -> Result<i64, AppError>;

    /// Address of the relayer's jetton wallet, resolved from the jetton
    /// master contract.
    async fn jetton_wallet_address(&self) -> Result<TonAddress, AppError>;

    /// The relayer wallet address.
    fn address(&self) -> &TonAddress;
}

/// The exchange venue used to convert TON into the target jetton.
#[async_trait]
pub trait SwapVenue: Send + Sync {
    /// Current reserves of the traded pair.
    async fn pool_reserves(&self) -> Result<PoolReserves, AppError>;

    /// Build a ready-to-send swap message for `offer_nanotons` of TON with a
    /// minimum acceptable jetton output of `min_ask_units`.
    async fn build_swap(
        &self,
        offer_nanotons: i64,
        min_ask_units: i64,
        recipient: &TonAddress,
    ) -> Result<MessageDescriptor, AppError>;
}

/// Source of incoming payment candidates.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetch and parse the wallet's recent incoming transfers. Each call
    /// re-queries the chain; the ledger's uniqueness check supplies
    /// idempotency, so no cursor is kept.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<CandidateTransaction>, AppError>;
}

/// Outbound reporting to the off-chain backend.
#[async_trait]
pub trait BackendNotifier: Send + Sync {
    /// Deliver the outcome of one processed payment. Best effort: callers
    /// log failures and move on.
    async fn notify_swap_result(
        &self,
        notification: &SwapResultNotification,
    ) -> Result<(), AppError>;

    /// Check backend reachability.
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalNotifier;

    #[async_trait]
    impl BackendNotifier for MinimalNotifier {
        async fn notify_swap_result(
            &self,
            _notification: &SwapResultNotification,
        ) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_backend_notifier_default_health_check() {
        let notifier = MinimalNotifier;
        assert!(notifier.health_check().await.is_ok());
    }
}
