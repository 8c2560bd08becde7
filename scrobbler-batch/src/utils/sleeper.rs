//! Waiting abstraction
//!
//! Every pause in a batch run (retry backoff, pacing, cooldown, failure penalty)
//! goes through a [`Sleeper`], so the timing policy can be exercised without
//! actually waiting.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested durations and returns immediately
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    recorded: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far, in order
    pub fn recorded(&self) -> Vec<Duration> {
        match self.recorded.lock() {
            Ok(recorded) => recorded.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Requested durations rounded down to whole seconds
    pub fn recorded_secs(&self) -> Vec<u64> {
        self.recorded().iter().map(Duration::as_secs).collect()
    }

    pub fn count(&self) -> usize {
        self.recorded().len()
    }

    pub fn total(&self) -> Duration {
        self.recorded().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        match self.recorded.lock() {
            Ok(mut recorded) => recorded.push(duration),
            Err(poisoned) => poisoned.into_inner().push(duration),
        }
    }
}
