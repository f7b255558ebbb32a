//! Recurring batch trigger.
//!
//! A single interval drives ingestion batches. An in-flight flag guarantees
//! at most one batch is active: a tick that fires while the previous batch
//! is still running performs no work at all. Batch errors are logged and the
//! loop keeps running until shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::service::RelayerService;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between batch triggers (default 30s)
    pub poll_interval: Duration,
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            enabled: true,
        }
    }
}

/// Spawn the recurring scheduler. Returns the task handle and a shutdown
/// sender; send `true` to stop the loop.
pub fn spawn_scheduler(
    service: Arc<RelayerService>,
    config: SchedulerConfig,
) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let in_flight = Arc::new(AtomicBool::new(false));

    let handle = tokio::spawn(async move {
        info!(
            interval_secs = config.poll_interval.as_secs(),
            "Scheduler started"
        );
        let mut ticker = tokio::time::interval(config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so startup finishes first.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if in_flight.swap(true, Ordering::SeqCst) {
                        debug!("Previous batch still in flight; skipping tick");
                        continue;
                    }

                    let service = Arc::clone(&service);
                    let flag = Arc::clone(&in_flight);
                    tokio::spawn(async move {
                        if let Err(e) = service.process_new_transactions().await {
                            error!(error = %e, "Batch failed");
                        }
                        flag.store(false, Ordering::SeqCst);
                    });
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Scheduler shutting down");
                        break;
                    }
                }
            }
        }
    });

    (handle, shutdown_tx)
}
