//! Outbound notifications to the off-chain backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::domain::{AppError, BackendNotifier, SwapResultNotification};

/// HTTP notifier posting swap results to the backend webhook.
pub struct HttpBackendNotifier {
    http_client: Client,
    base_url: String,
}

impl HttpBackendNotifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ExternalService(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_defaults(base_url: &str) -> Result<Self, AppError> {
        Self::new(base_url, Duration::from_secs(10))
    }
}

#[async_trait]
impl BackendNotifier for HttpBackendNotifier {
    #[instrument(skip(self, notification), fields(user = %notification.user_address, success = notification.success))]
    async fn notify_swap_result(
        &self,
        notification: &SwapResultNotification,
    ) -> Result<(), AppError> {
        let url = format!("{}/api/relayer/swap-result", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(notification)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "backend returned {}",
                response.status()
            )));
        }

        debug!("Backend notification delivered");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/health", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "backend health returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
