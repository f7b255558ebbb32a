//! Application layer containing business logic and shared state.

pub mod burn;
pub mod metrics;
pub mod refund;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod swap;

pub use burn::{BurnConfig, BurnExecutor};
pub use metrics::{MetricsConfig, MetricsService};
pub use refund::{RefundConfig, RefundHandler};
pub use scheduler::{SchedulerConfig, spawn_scheduler};
pub use service::{ProcessorConfig, RelayerService};
pub use state::AppState;
pub use swap::{SwapConfig, SwapExecutor};
