//! Outbound throttle for the TON RPC endpoint.
//!
//! Provider quotas are enforced with two primitives: a governor direct rate
//! limiter spacing dispatches at least `min_interval` apart, and a semaphore
//! bounding the number of in-flight calls. Every RPC call acquires both.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::{Semaphore, SemaphorePermit};

/// Throttle configuration for outbound RPC calls.
#[derive(Debug, Clone)]
pub struct RpcThrottleConfig {
    /// Minimum spacing between dispatches
    pub min_interval: Duration,
    /// Maximum simultaneous in-flight calls
    pub max_concurrent: usize,
}

impl Default for RpcThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(200),
            max_concurrent: 5,
        }
    }
}

/// Combined spacing + concurrency limiter.
pub struct RpcRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    semaphore: Semaphore,
}

impl RpcRateLimiter {
    #[must_use]
    pub fn new(config: &RpcThrottleConfig) -> Self {
        let quota = Quota::with_period(config.min_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(5).expect("nonzero")));
        Self {
            limiter: RateLimiter::direct(quota),
            semaphore: Semaphore::new(config.max_concurrent),
        }
    }

    /// Wait for a dispatch slot. The returned permit bounds concurrency for
    /// the duration of the call; spacing is enforced before the permit is
    /// handed out.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("rate limiter semaphore closed");
        self.limiter.until_ready().await;
        permit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_default_config() {
        let config = RpcThrottleConfig::default();
        assert_eq!(config.min_interval, Duration::from_millis(200));
        assert_eq!(config.max_concurrent, 5);
    }

    #[tokio::test]
    async fn test_spacing_between_dispatches() {
        let limiter = RpcRateLimiter::new(&RpcThrottleConfig {
            min_interval: Duration::from_millis(50),
            max_concurrent: 5,
        });

        let start = Instant::now();
        for _ in 0..3 {
            let _permit = limiter.acquire().await;
        }
        // First slot is free; the next two are spaced 50ms apart.
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let limiter = Arc::new(RpcRateLimiter::new(&RpcThrottleConfig {
            min_interval: Duration::from_millis(1),
            max_concurrent: 2,
        }));

        let a = limiter.acquire().await;
        let _b = limiter.acquire().await;

        let l = Arc::clone(&limiter);
        let blocked = tokio::spawn(async move {
            let _c = l.acquire().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        drop(a);
        blocked.await.unwrap();
    }
}
