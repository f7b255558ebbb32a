//! The processing state machine driving each payment to a terminal state.
//!
//! Pending -> Processing -> Completed | Failed | Refunded. Terminal records
//! are never revisited; a record left in Processing by a prior run is left
//! untouched for manual inspection. Errors inside one record's processing
//! never affect other records or the scheduler's next firing.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, BackendNotifier, CandidateTransaction, HealthReport, LedgerStore,
    ProcessPaymentRequest, ProcessPaymentResponse, SwapResultNotification, TonAddress,
    TransactionRecord, TransactionSource, TransactionStatus, ValidationError, WalletGateway,
};
use crate::infra::ton::messages::OutboundBody;

use super::burn::BurnExecutor;
use super::metrics::MetricsService;
use super::refund::RefundHandler;
use super::swap::SwapExecutor;

/// Processing configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Fixed gas reserve subtracted from each payment before the swap,
    /// nanotons (default 0.2 TON)
    pub gas_reserve: i64,
    /// Gas attached to on-chain callbacks, nanotons
    pub gas_for_callback: i64,
    /// Subscription contract receiving callbacks
    pub subscription_contract: TonAddress,
    /// How many recent transactions one batch fetches
    pub fetch_limit: usize,
}

impl ProcessorConfig {
    #[must_use]
    pub fn new(subscription_contract: TonAddress) -> Self {
        Self {
            gas_reserve: 200_000_000,
            gas_for_callback: 10_000_000,
            subscription_contract,
            fetch_limit: 25,
        }
    }
}

/// Where the pipeline ended for one record.
struct PipelineOutcome {
    status: TransactionStatus,
    error_message: Option<String>,
    jetton_amount: Option<i64>,
}

/// Orchestrates ingestion, dedup, swap, burn, refund and reporting.
pub struct RelayerService {
    ledger: Arc<dyn LedgerStore>,
    wallet: Arc<dyn WalletGateway>,
    source: Arc<dyn TransactionSource>,
    swap: SwapExecutor,
    burn: BurnExecutor,
    refund: RefundHandler,
    notifier: Arc<dyn BackendNotifier>,
    metrics: Arc<MetricsService>,
    config: ProcessorConfig,
}

impl RelayerService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        wallet: Arc<dyn WalletGateway>,
        source: Arc<dyn TransactionSource>,
        swap: SwapExecutor,
        burn: BurnExecutor,
        refund: RefundHandler,
        notifier: Arc<dyn BackendNotifier>,
        metrics: Arc<MetricsService>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            ledger,
            wallet,
            source,
            swap,
            burn,
            refund,
            notifier,
            metrics,
            config,
        }
    }

    /// One scheduler batch: fetch recent transfers, admit the unseen ones and
    /// drive each to a terminal state. Returns the number of newly admitted
    /// records.
    #[instrument(skip(self))]
    pub async fn process_new_transactions(&self) -> Result<usize, AppError> {
        if let Ok(balance) = self.wallet.balance().await {
            self.metrics.update_wallet_balance(balance);
        }

        let candidates = self.source.fetch_recent(self.config.fetch_limit).await?;
        let mut admitted = 0;

        for candidate in &candidates {
            // The unique (lt, hash) constraint makes re-observed transactions
            // a no-op here, regardless of their current status.
            match self.ledger.try_create(candidate).await {
                Ok(Some(record)) => {
                    admitted += 1;
                    self.process_record(&record).await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(lt = candidate.lt, hash = %candidate.hash, error = %e, "Admission failed");
                }
            }
        }

        if admitted > 0 {
            info!(
                fetched = candidates.len(),
                admitted = admitted,
                "Batch processed"
            );
        }
        Ok(admitted)
    }

    /// Synchronous pipeline for a payment reported by the backend.
    #[instrument(skip(self, request), fields(user = %request.user_address, lt = request.lt))]
    pub async fn process_payment(
        &self,
        request: &ProcessPaymentRequest,
    ) -> Result<ProcessPaymentResponse, AppError> {
        request
            .validate()
            .map_err(|e| AppError::Validation(ValidationError::Multiple(e.to_string())))?;

        let candidate = CandidateTransaction {
            lt: request.lt,
            hash: request.tx_hash.clone(),
            from_address: request.subscription_contract_address.clone(),
            to_address: self.wallet.address().to_string(),
            value_nanotons: request.amount_nanotons,
            user_address: request.user_address.clone(),
            body: None,
        };

        let record = match self.ledger.insert_pending(&candidate).await? {
            Some(record) => record,
            None => {
                // Already seen; never reprocessed.
                let existing = self.ledger.find_by_key(request.lt, &request.tx_hash).await?;
                let (tx_id, status) = existing
                    .map(|r| (r.id.to_string(), r.status))
                    .unwrap_or((String::new(), TransactionStatus::Pending));
                return Ok(ProcessPaymentResponse {
                    success: false,
                    tx_id,
                    message: format!("Transaction already known (status: {})", status),
                });
            }
        };

        self.ledger.mark_processing(record.id).await?;
        self.process_record(&record).await;

        let finished = self
            .ledger
            .find_by_key(record.lt, &record.hash)
            .await?
            .unwrap_or(record);

        Ok(ProcessPaymentResponse {
            success: finished.status == TransactionStatus::Completed,
            tx_id: finished.id.to_string(),
            message: match finished.status {
                TransactionStatus::Completed => "Subscription processed successfully".to_string(),
                status => finished
                    .error_message
                    .unwrap_or_else(|| format!("Processing ended in status {}", status)),
            },
        })
    }

    /// Drive one claimed record to a terminal state and report the outcome.
    async fn process_record(&self, record: &TransactionRecord) {
        let started = Instant::now();

        match self.run_pipeline(record).await {
            Ok(outcome) => {
                let success = outcome.status == TransactionStatus::Completed;
                if let Err(e) = self
                    .ledger
                    .finalize(
                        record.id,
                        outcome.status,
                        outcome.error_message.as_deref(),
                        outcome.jetton_amount,
                    )
                    .await
                {
                    error!(id = %record.id, error = %e, "Failed to finalize record");
                }

                self.metrics.record_transaction(
                    success,
                    outcome.jetton_amount.unwrap_or(0),
                    record.amount_nanotons,
                    started.elapsed(),
                );
                self.notify_backend(record, success, outcome.jetton_amount, outcome.error_message)
                    .await;
            }
            Err(e) => {
                // Unexpected failure (ledger, address parsing already handled
                // inside the pipeline): count a retry and park the record as
                // failed for operators.
                error!(id = %record.id, error = %e, "Pipeline error");
                if let Err(inc_err) = self.ledger.increment_retry_count(record.id).await {
                    error!(id = %record.id, error = %inc_err, "Failed to increment retry count");
                }
                if let Err(fin_err) = self
                    .ledger
                    .finalize(
                        record.id,
                        TransactionStatus::Failed,
                        Some(&e.to_string()),
                        None,
                    )
                    .await
                {
                    error!(id = %record.id, error = %fin_err, "Failed to finalize errored record");
                }
                self.metrics
                    .record_transaction(false, 0, record.amount_nanotons, started.elapsed());
                self.notify_backend(record, false, None, Some(e.to_string()))
                    .await;
            }
        }
    }

    /// The state machine proper. Expected business failures become outcomes;
    /// only unexpected errors escape as `Err`.
    async fn run_pipeline(&self, record: &TransactionRecord) -> Result<PipelineOutcome, AppError> {
        let user: TonAddress = match record.user_address.parse() {
            Ok(user) => user,
            Err(e) => {
                return Ok(PipelineOutcome {
                    status: TransactionStatus::Failed,
                    error_message: Some(format!("Invalid user address: {}", e)),
                    jetton_amount: None,
                });
            }
        };

        let swap_amount = record.amount_nanotons - self.config.gas_reserve;
        if swap_amount <= 0 {
            // Not enough to even attempt a swap; zero outgoing sends.
            return Ok(PipelineOutcome {
                status: TransactionStatus::Failed,
                error_message: Some(format!(
                    "Insufficient amount for gas: {} <= {}",
                    record.amount_nanotons, self.config.gas_reserve
                )),
                jetton_amount: None,
            });
        }

        let correlation_id = record.id.to_string();

        let jetton_amount = match self.swap.execute(swap_amount, &correlation_id).await {
            Ok(amount) => amount,
            Err(e) => {
                warn!(id = %correlation_id, error = %e, "Swap failed");
                return Ok(self
                    .handle_failure(record, &user, format!("Swap failed: {}", e), None)
                    .await);
            }
        };

        if let Err(e) = self.burn.execute(jetton_amount, &correlation_id).await {
            warn!(id = %correlation_id, error = %e, "Burn failed");
            return Ok(self
                .handle_failure(
                    record,
                    &user,
                    format!("Burn failed: {}", e),
                    Some(jetton_amount),
                )
                .await);
        }

        self.send_callback(&user, jetton_amount).await;

        info!(id = %correlation_id, jetton_amount = jetton_amount, "Payment completed");
        Ok(PipelineOutcome {
            status: TransactionStatus::Completed,
            error_message: None,
            jetton_amount: Some(jetton_amount),
        })
    }

    /// Route a swap or burn failure to refund, then decide the terminal
    /// state.
    async fn handle_failure(
        &self,
        record: &TransactionRecord,
        user: &TonAddress,
        cause: String,
        jetton_amount: Option<i64>,
    ) -> PipelineOutcome {
        match self.refund.refund(user, record.amount_nanotons).await {
            Ok(()) => PipelineOutcome {
                status: TransactionStatus::Refunded,
                error_message: Some(cause),
                jetton_amount,
            },
            Err(refund_err) => {
                error!(
                    id = %record.id,
                    error = %refund_err,
                    "CRITICAL: refund failed after processing failure; manual intervention required"
                );
                PipelineOutcome {
                    status: TransactionStatus::Failed,
                    error_message: Some(format!("{}. Refund failed: {}", cause, refund_err)),
                    jetton_amount,
                }
            }
        }
    }

    /// Best-effort on-chain callback; failure never changes the stored
    /// outcome.
    async fn send_callback(&self, user: &TonAddress, jetton_amount: i64) {
        let body = OutboundBody::SwapCallback {
            user: user.clone(),
            jetton_amount,
            success: true,
        }
        .encode();

        match self
            .wallet
            .send(
                &self.config.subscription_contract,
                self.config.gas_for_callback,
                body,
            )
            .await
        {
            Ok(_) => info!(user = %user, "Swap callback sent"),
            Err(e) => warn!(user = %user, error = %e, "Failed to send swap callback"),
        }
    }

    /// Best-effort backend webhook.
    async fn notify_backend(
        &self,
        record: &TransactionRecord,
        success: bool,
        jetton_amount: Option<i64>,
        error_message: Option<String>,
    ) {
        let notification = SwapResultNotification {
            user_address: record.user_address.clone(),
            success,
            tx_id: record.id.to_string(),
            jetton_amount: jetton_amount.map(|a| a.to_string()),
            error: error_message,
        };

        if let Err(e) = self.notifier.notify_swap_result(&notification).await {
            warn!(id = %record.id, error = %e, "Backend notification failed");
        }
    }

    /// Aggregate health verdict for the operator endpoint.
    #[must_use]
    pub fn health_report(&self) -> HealthReport {
        let (healthy, issues) = self.metrics.check_health();
        HealthReport {
            healthy,
            issues,
            metrics: self.metrics.snapshot(),
        }
    }

    /// Recent ledger records, newest first.
    pub async fn transaction_history(
        &self,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        self.ledger.list_recent(limit).await
    }

    /// Ledger connectivity, for the readiness probe.
    pub async fn ledger_health(&self) -> Result<(), AppError> {
        self.ledger.health_check().await
    }

    /// Startup balance check: records the balance and warns when it cannot
    /// cover the configured safety floor.
    pub async fn check_wallet_balance(&self) -> Result<(), AppError> {
        let balance = self.wallet.balance().await?;
        self.metrics.update_wallet_balance(balance);

        let min_balance = self.config.gas_for_callback * 100;
        if balance < min_balance {
            warn!(
                balance = balance,
                min_balance = min_balance,
                "Relayer wallet balance below safety floor"
            );
        } else {
            info!(balance = balance, "Relayer wallet balance checked");
        }
        Ok(())
    }
}
