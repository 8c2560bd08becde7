//! Batch runner
//!
//! Drives one batch through submission, strictly one event at a time.
//!
//! # State Progression
//! RUNNING → COMPLETED, or RUNNING → HALTED_BY_ERROR_THRESHOLD → COMPLETED
//!
//! # Per-item steps
//! 1. Submit through the [`RetryPolicy`]
//! 2. Success: count it, reset the consecutive-failure streak, report progress
//!    on every 100th position of the source file
//! 3. Failure: count it, record a [`FailedEvent`], and once the streak exceeds 3
//!    wait `min(60, streak * 10)` seconds on top of the normal pacing
//! 4. Streak above 10: halt, leaving the remaining items unattempted
//! 5. Otherwise pace via the [`ThrottleController`] (delay, periodic cooldown)
//!
//! Items are never submitted concurrently; the failure streak and the service's
//! rate limits both assume strict ordering.

use crate::models::{Batch, FailedEvent, SubmissionOutcome};
use crate::services::{ResultLog, ThrottleController};
use crate::utils::{RetryPolicy, Sleeper};
use scrobbler_common::events::{BatchEvent, EventBus};
use scrobbler_common::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Progress report interval, in source-file positions
pub const PROGRESS_INTERVAL: usize = 100;
/// Streak length above which each further failure adds a penalty wait
pub const PENALTY_THRESHOLD: usize = 3;
/// Streak length above which the run halts
pub const HALT_THRESHOLD: usize = 10;

const PENALTY_SECS_PER_ERROR: u64 = 10;
const MAX_PENALTY_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Running,
    HaltedByErrorThreshold,
    Completed,
}

/// Counters and failures for one run, owned by the runner
#[derive(Debug, Clone, Default)]
pub struct BatchState {
    pub success_count: usize,
    pub error_count: usize,
    pub consecutive_errors: usize,
    pub failures: Vec<FailedEvent>,
}

impl BatchState {
    /// Items attempted so far
    pub fn processed(&self) -> usize {
        self.success_count + self.error_count
    }

    fn record_success(&mut self) {
        self.success_count += 1;
        self.consecutive_errors = 0;
    }

    fn record_failure(&mut self, failure: FailedEvent) {
        self.error_count += 1;
        self.consecutive_errors += 1;
        self.failures.push(failure);
    }
}

/// Result of one run, handed to the [`ResultLog`]
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub file_name: String,
    pub start_index: usize,
    /// Events in this run (after `start_index`)
    pub total: usize,
    /// True when the consecutive-failure threshold stopped the run
    pub halted: bool,
    pub state: BatchState,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.state.success_count
    }

    pub fn failed(&self) -> usize {
        self.state.error_count
    }

    pub fn processed(&self) -> usize {
        self.state.processed()
    }

    /// Items never attempted because the run halted
    pub fn skipped(&self) -> usize {
        self.total - self.processed()
    }

    pub fn summary(&self) -> String {
        ResultLog::summarize(&self.file_name, self.succeeded(), self.failed(), self.total)
    }
}

/// Extra wait after a failure that extends the streak to `consecutive_errors`
pub fn penalty_for(consecutive_errors: usize) -> Option<Duration> {
    if consecutive_errors <= PENALTY_THRESHOLD {
        return None;
    }
    let secs = (consecutive_errors as u64)
        .saturating_mul(PENALTY_SECS_PER_ERROR)
        .min(MAX_PENALTY_SECS);
    Some(Duration::from_secs(secs))
}

pub struct BatchRunner {
    retry: RetryPolicy,
    throttle: ThrottleController,
    sleeper: Arc<dyn Sleeper>,
    event_bus: EventBus,
    run_state: RunState,
}

impl BatchRunner {
    /// # Arguments
    /// * `sleeper` - Used for consecutive-failure penalty waits
    pub fn new(
        retry: RetryPolicy,
        throttle: ThrottleController,
        sleeper: Arc<dyn Sleeper>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            retry,
            throttle,
            sleeper,
            event_bus,
            run_state: RunState::Completed,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Submit every event in `batch`, stopping early on a long failure streak
    pub async fn run(&mut self, batch: &Batch) -> BatchReport {
        self.run_state = RunState::Running;
        let mut state = BatchState::default();
        let run_length = batch.len();

        tracing::info!(
            file = %batch.name,
            start_index = batch.start_index,
            count = run_length,
            max_retries = self.retry.max_retries(),
            "Starting batch"
        );

        for (i, event) in batch.events.iter().enumerate() {
            let position = batch.start_index + i + 1;

            match self.retry.attempt(event).await {
                SubmissionOutcome::Success => {
                    state.record_success();

                    if position % PROGRESS_INTERVAL == 0 {
                        tracing::info!(
                            position,
                            total = batch.source_len(),
                            succeeded = state.success_count,
                            failed = state.error_count,
                            "[{}/{}] Progress: {} scrobbled, {} errors",
                            position,
                            batch.source_len(),
                            state.success_count,
                            state.error_count
                        );
                        self.event_bus.emit_lossy(BatchEvent::Progress {
                            position,
                            total: batch.source_len(),
                            succeeded: state.success_count,
                            failed: state.error_count,
                        });
                    }
                }
                SubmissionOutcome::Failure { reason } => {
                    state.record_failure(FailedEvent::new(event, reason.clone()));

                    tracing::error!(
                        position = i + 1,
                        artist = %event.artist_name,
                        track = %event.track_name,
                        "[{}/{}] ERROR: {} - {}: {}",
                        i + 1,
                        run_length,
                        event.artist_name,
                        event.track_name,
                        reason
                    );
                    self.event_bus.emit_lossy(BatchEvent::ItemFailed {
                        position: i + 1,
                        run_length,
                        artist: event.artist_name.clone(),
                        track: event.track_name.clone(),
                        error: reason,
                    });

                    if let Some(wait) = penalty_for(state.consecutive_errors) {
                        tracing::warn!(
                            consecutive_errors = state.consecutive_errors,
                            wait_secs = wait.as_secs(),
                            "Multiple consecutive errors, waiting {}s",
                            wait.as_secs()
                        );
                        self.event_bus.emit_lossy(BatchEvent::PenaltyWait {
                            consecutive_errors: state.consecutive_errors,
                            wait_secs: wait.as_secs(),
                        });
                        self.sleeper.sleep(wait).await;
                    }
                }
            }

            if state.consecutive_errors > HALT_THRESHOLD {
                self.run_state = RunState::HaltedByErrorThreshold;
                tracing::error!(
                    consecutive_errors = state.consecutive_errors,
                    remaining = run_length - (i + 1),
                    "Too many consecutive errors: Stopping."
                );
                self.event_bus.emit_lossy(BatchEvent::Halted {
                    consecutive_errors: state.consecutive_errors,
                });
                break;
            }

            self.throttle.wait_between_items().await;

            let processed = i + 1;
            let event_bus = &self.event_bus;
            self.throttle
                .maybe_cooldown(processed, |cooldown| {
                    tracing::info!(
                        processed,
                        wait_secs = cooldown.as_secs(),
                        "Processed {} songs, taking a {}s cooldown break...",
                        processed,
                        cooldown.as_secs()
                    );
                    event_bus.emit_lossy(BatchEvent::Cooldown {
                        processed,
                        wait_secs: cooldown.as_secs(),
                    });
                })
                .await;
        }

        let halted = self.run_state == RunState::HaltedByErrorThreshold;
        self.run_state = RunState::Completed;

        BatchReport {
            file_name: batch.name.clone(),
            start_index: batch.start_index,
            total: run_length,
            halted,
            state,
        }
    }

    /// Run the batch, persist results, and publish the summary
    ///
    /// The summary and `Finished` event are published even when writing the
    /// result log fails; the write error is returned afterwards.
    pub async fn run_and_record(&mut self, batch: &Batch, log: &ResultLog) -> Result<BatchReport> {
        let report = self.run(batch).await;
        let flushed = log.flush(&report);

        tracing::info!(
            file = %report.file_name,
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            halted = report.halted,
            "{}",
            report.summary()
        );
        self.event_bus.emit_lossy(BatchEvent::Finished {
            file_name: report.file_name.clone(),
            succeeded: report.succeeded(),
            failed: report.failed(),
            total: report.total,
            halted: report.halted,
        });

        flushed.map(|()| report)
    }
}
