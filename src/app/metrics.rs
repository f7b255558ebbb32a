//! Processing metrics and the health verdict.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::RelayerMetrics;

/// Smoothing factor for the rolling average processing time.
const EMA_ALPHA: f64 = 0.1;

/// Minimum sample count before the success rate contributes to the verdict.
const MIN_SAMPLES_FOR_RATE: u64 = 10;

/// Success rate below which the service is reported unhealthy, percent.
const MIN_SUCCESS_RATE_PCT: f64 = 80.0;

/// Safety multiple of the callback gas the wallet balance must cover.
const BALANCE_SAFETY_MULTIPLE: i64 = 100;

/// Health thresholds.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Gas reserved per callback, nanotons; the balance floor is a multiple
    /// of this
    pub gas_for_callback: i64,
    /// How long processing may sit idle before the verdict flags it
    pub max_idle: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            gas_for_callback: 10_000_000,
            max_idle: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Default)]
struct MetricsInner {
    total: u64,
    successful: u64,
    failed: u64,
    total_jettons_burned: i64,
    total_ton_swapped: i64,
    average_processing_ms: f64,
    last_processed_at: Option<DateTime<Utc>>,
    wallet_balance: i64,
}

/// Aggregates per-attempt outcomes; read-only for everything but the
/// processor.
pub struct MetricsService {
    config: MetricsConfig,
    started_at: Instant,
    inner: Mutex<MetricsInner>,
}

impl MetricsService {
    #[must_use]
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            started_at: Instant::now(),
            inner: Mutex::new(MetricsInner::default()),
        }
    }

    /// Record one processing attempt.
    pub fn record_transaction(
        &self,
        success: bool,
        jetton_amount: i64,
        ton_amount: i64,
        elapsed: Duration,
    ) {
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        inner.total += 1;
        if success {
            inner.successful += 1;
            inner.total_jettons_burned += jetton_amount;
            inner.total_ton_swapped += ton_amount;
        } else {
            inner.failed += 1;
        }

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        inner.average_processing_ms = if inner.total == 1 {
            elapsed_ms
        } else {
            EMA_ALPHA * elapsed_ms + (1.0 - EMA_ALPHA) * inner.average_processing_ms
        };
        inner.last_processed_at = Some(Utc::now());

        debug!(
            total = inner.total,
            success = inner.successful,
            failed = inner.failed,
            "Metrics updated"
        );
    }

    pub fn update_wallet_balance(&self, balance: i64) {
        self.inner.lock().expect("metrics lock poisoned").wallet_balance = balance;
    }

    #[must_use]
    pub fn snapshot(&self) -> RelayerMetrics {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        RelayerMetrics {
            total_transactions: inner.total,
            successful_transactions: inner.successful,
            failed_transactions: inner.failed,
            total_jettons_burned: inner.total_jettons_burned,
            total_ton_swapped: inner.total_ton_swapped,
            average_processing_ms: inner.average_processing_ms,
            last_processed_at: inner.last_processed_at,
            wallet_balance_nanotons: inner.wallet_balance,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    #[must_use]
    pub fn success_rate_pct(&self) -> f64 {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        if inner.total == 0 {
            return 0.0;
        }
        inner.successful as f64 / inner.total as f64 * 100.0
    }

    /// Aggregate health verdict.
    #[must_use]
    pub fn check_health(&self) -> (bool, Vec<String>) {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        let mut issues = Vec::new();

        if inner.total > MIN_SAMPLES_FOR_RATE {
            let rate = inner.successful as f64 / inner.total as f64 * 100.0;
            if rate < MIN_SUCCESS_RATE_PCT {
                issues.push(format!("Low success rate: {:.2}%", rate));
            }
        }

        let min_balance = self.config.gas_for_callback * BALANCE_SAFETY_MULTIPLE;
        if inner.wallet_balance < min_balance {
            issues.push(format!(
                "Low wallet balance: {} nanotons",
                inner.wallet_balance
            ));
        }

        if let Some(last) = inner.last_processed_at {
            let idle = Utc::now().signed_duration_since(last);
            if idle.num_seconds() > self.config.max_idle.as_secs() as i64 {
                issues.push(format!(
                    "No transactions processed for {}s",
                    idle.num_seconds()
                ));
            }
        }

        (issues.is_empty(), issues)
    }
}
