//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;
use utoipa::OpenApi;

use crate::app::AppState;
use crate::domain::{
    AppError, ChainError, DatabaseError, ErrorDetail, ErrorResponse, HealthReport,
    ProcessPaymentRequest, ProcessPaymentResponse, TransactionRecord,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TON Burn Relayer API",
        version = "0.1.0",
        description = "API for processing subscription payments: swap incoming TON into jettons, burn them and report the outcome",
        license(
            name = "MIT"
        )
    ),
    paths(
        process_subscription_handler,
        relayer_health_handler,
        transaction_history_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            ProcessPaymentRequest,
            ProcessPaymentResponse,
            TransactionRecord,
            crate::domain::TransactionStatus,
            crate::domain::RelayerMetrics,
            HealthReport,
            ErrorResponse,
            ErrorDetail,
        )
    ),
    tags(
        (name = "relayer", description = "Payment processing endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Process a known subscription payment
///
/// Runs the full pipeline synchronously: dedup, swap, burn, callback (or
/// refund on failure). The `(lt, txHash)` pair deduplicates against payments
/// already observed by the chain poller.
#[utoipa::path(
    post,
    path = "/api/relayer/process-subscription",
    tag = "relayer",
    request_body = ProcessPaymentRequest,
    responses(
        (status = 200, description = "Pipeline finished; success flag reflects the terminal state", body = ProcessPaymentResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 503, description = "Service unavailable", body = ErrorResponse)
    )
)]
pub async fn process_subscription_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ProcessPaymentRequest>,
) -> Result<Json<ProcessPaymentResponse>, AppError> {
    let response = state.service.process_payment(&payload).await?;
    Ok(Json(response))
}

/// Relayer health: liveness plus the aggregated metrics verdict
#[utoipa::path(
    get,
    path = "/api/relayer/health",
    tag = "health",
    responses(
        (status = 200, description = "Health report", body = HealthReport)
    )
)]
pub async fn relayer_health_handler(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.service.health_report())
}

/// Query parameters for the history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

/// Recent transaction records, newest first
#[utoipa::path(
    get,
    path = "/api/relayer/transactions",
    tag = "relayer",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of records to return (default: 100)")
    ),
    responses(
        (status = 200, description = "Recent transaction records", body = Vec<TransactionRecord>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn transaction_history_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    let limit = params.limit.unwrap_or(100);
    let records = state.service.transaction_history(limit).await?;
    Ok(Json(records))
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.service.ledger_health().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type, message) = match &self {
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "database_error",
                    self.to_string(),
                ),
                DatabaseError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", self.to_string())
                }
                DatabaseError::Duplicate(_) => {
                    (StatusCode::CONFLICT, "duplicate", self.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    self.to_string(),
                ),
            },
            AppError::Chain(chain_err) => match chain_err {
                ChainError::Transport(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "chain_error",
                    self.to_string(),
                ),
                ChainError::InsufficientFunds
                | ChainError::InsufficientJettons { .. }
                | ChainError::RefundShortfall { .. } => (
                    StatusCode::PAYMENT_REQUIRED,
                    "insufficient_funds",
                    self.to_string(),
                ),
                ChainError::Timeout(_) | ChainError::ConfirmationTimeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "chain_error",
                    self.to_string(),
                ),
            },
            AppError::Swap(_) => (StatusCode::BAD_GATEWAY, "swap_error", self.to_string()),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                self.to_string(),
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                self.to_string(),
            ),
            AppError::ExternalService(_) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                self.to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Rate limit exceeded".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
