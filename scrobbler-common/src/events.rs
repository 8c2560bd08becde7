//! Batch event system
//!
//! Provides the event definitions emitted while a batch is submitted and the
//! EventBus that distributes them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted during a scrobble batch run
///
/// Every notice the runner prints is also published here so that other
/// components (progress displays, tests) can observe the run without parsing logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchEvent {
    /// Transient failure, another attempt follows after `wait_secs`
    RetryScheduled {
        /// 1-based attempt number that just failed
        attempt: u32,
        max_attempts: u32,
        wait_secs: u64,
        error: String,
    },

    /// Periodic progress report (every 100th successful item)
    Progress {
        /// 1-based position in the source file
        position: usize,
        /// Index one past the last item in the source file
        total: usize,
        succeeded: usize,
        failed: usize,
    },

    /// An item failed permanently for this run
    ItemFailed {
        /// 1-based position within this run
        position: usize,
        run_length: usize,
        artist: String,
        track: String,
        error: String,
    },

    /// Extra wait after several consecutive failures
    PenaltyWait {
        consecutive_errors: usize,
        wait_secs: u64,
    },

    /// Run stopped early after too many consecutive failures
    Halted { consecutive_errors: usize },

    /// Periodic cooldown pause
    Cooldown { processed: usize, wait_secs: u64 },

    /// Run finished and results were flushed
    Finished {
        file_name: String,
        succeeded: usize,
        failed: usize,
        total: usize,
        halted: bool,
    },
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use scrobbler_common::events::{BatchEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(BatchEvent::Halted { consecutive_errors: 11 });
/// assert_eq!(rx.try_recv().unwrap(), BatchEvent::Halted { consecutive_errors: 11 });
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BatchEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: BatchEvent,
    ) -> Result<usize, broadcast::error::SendError<BatchEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BatchEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
