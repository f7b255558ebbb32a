//! Shared utilities.

pub mod poll;

pub use poll::{PollSchedule, poll_until, retry_with_backoff};
