//! Incoming transaction ingestion.
//!
//! Re-queries the chain on every call and parses transfers into canonical
//! candidates. No cursor is persisted: the ledger's `(lt, hash)` uniqueness
//! check makes repeated observation of the same transaction harmless.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, instrument, warn};

use crate::domain::{AppError, CandidateTransaction, TonAddress, TransactionSource};

use super::messages::InboundPayload;
use super::rpc::{RawTransaction, TonRpcProvider};

/// Polls the relayer wallet's recent incoming transfers.
pub struct TransactionIngestor {
    provider: Arc<dyn TonRpcProvider>,
    wallet_address: TonAddress,
}

impl TransactionIngestor {
    pub fn new(provider: Arc<dyn TonRpcProvider>, wallet_address: TonAddress) -> Self {
        Self {
            provider,
            wallet_address,
        }
    }

    /// Parse one raw transaction into a candidate. `None` means filtered out
    /// (aborted, no in-message, no source, zero value) or unparseable.
    fn parse_candidate(&self, tx: &RawTransaction) -> Option<CandidateTransaction> {
        if tx.aborted {
            debug!(hash = %tx.transaction_id.hash, "Skipping aborted transaction");
            return None;
        }

        let in_msg = tx.in_msg.as_ref()?;
        let source = in_msg.source.as_deref().filter(|s| !s.is_empty())?;

        let value: i64 = match in_msg.value.as_deref().map(str::parse) {
            Some(Ok(v)) if v > 0 => v,
            _ => {
                debug!(lt = %tx.transaction_id.lt, "Skipping transaction with missing or zero value");
                return None;
            }
        };

        let lt: i64 = match tx.transaction_id.lt.parse() {
            Ok(lt) => lt,
            Err(e) => {
                warn!(lt = %tx.transaction_id.lt, error = %e, "Failed to parse logical time");
                return None;
            }
        };

        let body = in_msg
            .msg_data
            .as_ref()
            .and_then(|d| d.body.as_deref())
            .and_then(|b64| match BASE64.decode(b64) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    debug!(lt = lt, error = %e, "Failed to decode message body");
                    None
                }
            });

        // The payment marker carries the paying user's address; transfers
        // without it are credited to the source.
        let user_address = body
            .as_deref()
            .and_then(|bytes| match InboundPayload::decode(bytes) {
                Ok(InboundPayload::SubscriptionPayment { user }) => Some(user.to_string()),
                Err(e) => {
                    debug!(lt = lt, error = %e, "Message body is not a payment marker");
                    None
                }
            })
            .unwrap_or_else(|| source.to_string());

        Some(CandidateTransaction {
            lt,
            hash: tx.transaction_id.hash.clone(),
            from_address: source.to_string(),
            to_address: in_msg
                .destination
                .clone()
                .unwrap_or_else(|| self.wallet_address.to_string()),
            value_nanotons: value,
            user_address,
            body,
        })
    }
}

#[async_trait]
impl TransactionSource for TransactionIngestor {
    #[instrument(skip(self))]
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<CandidateTransaction>, AppError> {
        let raw = self
            .provider
            .get_transactions(&self.wallet_address, limit)
            .await?;

        let candidates: Vec<CandidateTransaction> = raw
            .iter()
            .filter_map(|tx| self.parse_candidate(tx))
            .collect();

        debug!(
            fetched = raw.len(),
            parsed = candidates.len(),
            "Ingested recent transactions"
        );
        Ok(candidates)
    }
}
