//! Utility modules for scrobbler-batch

pub mod sleeper;
pub mod submit_retry;

pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use submit_retry::{backoff_for_attempt, RetryPolicy};
