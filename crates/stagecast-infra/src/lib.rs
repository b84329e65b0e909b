//! Process-level infrastructure shared by the Stagecast binaries and workers.

pub mod retry;
pub mod telemetry;

pub use retry::{retry_with_backoff, RetryPolicy};
pub use telemetry::init_telemetry;
