//! Application state management.

use std::sync::Arc;

use crate::domain::LedgerStore;

use super::metrics::MetricsService;
use super::service::RelayerService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RelayerService>,
    pub ledger: Arc<dyn LedgerStore>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    /// Create a new application state
    #[must_use]
    pub fn new(
        service: Arc<RelayerService>,
        ledger: Arc<dyn LedgerStore>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            service,
            ledger,
            metrics,
        }
    }
}
