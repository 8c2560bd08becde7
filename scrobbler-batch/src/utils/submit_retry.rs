//! Submission Retry Logic
//!
//! Implements exponential backoff retry for transient submission failures.
//!
//! **Algorithm:**
//! 1. Attempt submission
//! 2. If successful, return success
//! 3. If transient error:
//!    a. If attempts remain: log WARN, backoff, retry
//!    b. If attempts exhausted: return failure naming the attempt count
//! 4. If permanent or unclassified error: return failure immediately (no retry)
//!
//! **Backoff Strategy:** `min(60, 2^attempt)` seconds for 1-based `attempt`
//! (2s, 4s, 8s, 16s, 32s, then 60s).

use crate::models::{ListenEvent, SubmissionOutcome};
use crate::services::{ErrorClass, SubmissionClient};
use crate::utils::Sleeper;
use scrobbler_common::events::{BatchEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;

const MAX_BACKOFF_SECS: u64 = 60;

/// Backoff before the attempt following 1-based `attempt`
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let secs = 1u64
        .checked_shl(attempt)
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Bounded exponential-backoff wrapper around a [`SubmissionClient`]
pub struct RetryPolicy {
    client: Arc<dyn SubmissionClient>,
    sleeper: Arc<dyn Sleeper>,
    max_retries: u32,
    event_bus: Option<EventBus>,
}

impl RetryPolicy {
    /// # Arguments
    /// * `max_retries` - Total attempts per event (including the first)
    pub fn new(
        client: Arc<dyn SubmissionClient>,
        sleeper: Arc<dyn Sleeper>,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            sleeper,
            max_retries,
            event_bus: None,
        }
    }

    /// Publish a `RetryScheduled` event before every backoff
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Submit `event`, retrying transient failures
    pub async fn attempt(&self, event: &ListenEvent) -> SubmissionOutcome {
        for attempt in 1..=self.max_retries {
            let err = match self.client.submit(event).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::debug!(
                            artist = %event.artist_name,
                            track = %event.track_name,
                            attempt,
                            "Submission succeeded after retry"
                        );
                    }
                    return SubmissionOutcome::Success;
                }
                Err(err) => err,
            };

            match err.classification() {
                ErrorClass::Transient => {
                    if attempt == self.max_retries {
                        return SubmissionOutcome::failure(format!(
                            "Server error after {} attempts: {}",
                            self.max_retries, err
                        ));
                    }

                    let wait = backoff_for_attempt(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_retries,
                        wait_secs = wait.as_secs(),
                        error = %err,
                        "Server error (attempt {}/{}), waiting {}s",
                        attempt,
                        self.max_retries,
                        wait.as_secs()
                    );
                    if let Some(bus) = &self.event_bus {
                        bus.emit_lossy(BatchEvent::RetryScheduled {
                            attempt,
                            max_attempts: self.max_retries,
                            wait_secs: wait.as_secs(),
                            error: err.to_string(),
                        });
                    }
                    self.sleeper.sleep(wait).await;
                }
                ErrorClass::Permanent => {
                    return SubmissionOutcome::failure(format!("API error: {}", err));
                }
                ErrorClass::Unclassified => {
                    return SubmissionOutcome::failure(format!("Unexpected error: {}", err));
                }
            }
        }

        SubmissionOutcome::failure("Max retries exceeded")
    }
}
