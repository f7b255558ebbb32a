//! Bounded polling and retry with a configurable interval schedule.
//!
//! One utility shared by the wallet signer (seqno confirmation wait), the
//! swap executor (balance-diff wait) and wallet initialization (retry with
//! backoff). All waits in the pipeline are bounded; nothing blocks
//! indefinitely.

use std::future::Future;
use std::time::Duration;

use crate::domain::AppError;

/// Interval schedule for a bounded poll or retry loop.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each attempt (1.0 = fixed interval)
    pub growth: f64,
    pub max_delay: Duration,
}

impl PollSchedule {
    /// Fixed-interval schedule: `max_attempts` probes spaced `interval` apart.
    #[must_use]
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: interval,
            growth: 1.0,
            max_delay: interval,
        }
    }

    /// Progressively growing schedule, capped at `max_delay`.
    #[must_use]
    pub fn growing(
        max_attempts: u32,
        initial_delay: Duration,
        growth: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            growth,
            max_delay,
        }
    }

    /// Delay to sleep after attempt number `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.growth.powi(attempt as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_delay)
    }
}

/// Evaluate `probe` until it yields `Some`, sleeping per the schedule between
/// attempts. Returns `None` when all attempts are exhausted.
pub async fn poll_until<T, F, Fut>(schedule: &PollSchedule, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 0..schedule.max_attempts {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if attempt + 1 < schedule.max_attempts {
            tokio::time::sleep(schedule.delay_for(attempt)).await;
        }
    }
    None
}

/// Run `op` until it succeeds, an attempt fails the `should_retry` predicate,
/// or the schedule is exhausted. The last error is returned on exhaustion.
pub async fn retry_with_backoff<T, F, Fut, P>(
    schedule: &PollSchedule,
    mut op: F,
    mut should_retry: P,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
    P: FnMut(&AppError) -> bool,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= schedule.max_attempts || !should_retry(&e) {
                    return Err(e);
                }
                tokio::time::sleep(schedule.delay_for(attempt - 1)).await;
            }
        }
    }
}
