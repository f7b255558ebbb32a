//! Router assembly and inbound rate limiting.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::AppState;
use crate::domain::AppError;

use super::handlers::{
    ApiDoc, liveness_handler, process_subscription_handler, readiness_handler,
    relayer_health_handler, transaction_history_handler,
};

/// Inbound API rate limit configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst: 20,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            requests_per_second: std::env::var("RATE_LIMIT_PER_SECOND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.requests_per_second),
            burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.burst),
        }
    }
}

type SharedLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

async fn rate_limit_middleware(
    State(limiter): State<SharedLimiter>,
    request: axum::extract::Request,
    next: Next,
) -> Result<Response, AppError> {
    if limiter.check().is_err() {
        return Err(AppError::RateLimited);
    }
    Ok(next.run(request).await)
}

fn base_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/relayer/process-subscription",
            post(process_subscription_handler),
        )
        .route("/api/relayer/health", get(relayer_health_handler))
        .route("/api/relayer/transactions", get(transaction_history_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    base_router(state)
}

/// Create the application router with an inbound rate limiting layer
pub fn create_router_with_rate_limit(state: Arc<AppState>, config: RateLimitConfig) -> Router {
    let per_second =
        NonZeroU32::new(config.requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst.max(1)).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::per_second(per_second).allow_burst(burst);
    let limiter: SharedLimiter = Arc::new(RateLimiter::direct(quota));

    base_router(state).layer(middleware::from_fn_with_state(
        limiter,
        rate_limit_middleware,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_config_default() {
        let config = RateLimitConfig::default();
        assert_eq!(config.requests_per_second, 10);
        assert_eq!(config.burst, 20);
    }
}
