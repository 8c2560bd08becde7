//! Shared test utilities for scrobbler-batch integration tests
//!
//! - `ScriptedClient`: submission client answering from per-track scripts
//! - `Harness`: runner wired to recording sleepers and an event bus

#![allow(dead_code)]

use async_trait::async_trait;
use scrobbler_batch::models::ListenEvent;
use scrobbler_batch::services::{SubmissionClient, SubmitError, ThrottleController, ThrottleSettings};
use scrobbler_batch::utils::{RecordingSleeper, RetryPolicy};
use scrobbler_batch::workflow::BatchRunner;
use scrobbler_common::events::{BatchEvent, EventBus};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Submission client with scripted per-track answers
///
/// Tracks without a script succeed. `always` answers win over queued scripts;
/// an exhausted script falls back to success.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Result<(), SubmitError>>>>,
    always: Mutex<HashMap<String, SubmitError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer successive submissions of `track` from `answers`
    pub fn script(self, track: &str, answers: Vec<Result<(), SubmitError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(track.to_string(), answers.into());
        self
    }

    /// Fail every submission of `track` with `error`
    pub fn always(self, track: &str, error: SubmitError) -> Self {
        self.always.lock().unwrap().insert(track.to_string(), error);
        self
    }

    /// Track names in submission order (one entry per call)
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SubmissionClient for ScriptedClient {
    async fn submit(&self, event: &ListenEvent) -> Result<(), SubmitError> {
        self.calls.lock().unwrap().push(event.track_name.clone());

        if let Some(err) = self.always.lock().unwrap().get(&event.track_name) {
            return Err(err.clone());
        }

        self.scripts
            .lock()
            .unwrap()
            .get_mut(&event.track_name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }
}

/// Runner plus everything needed to observe it
pub struct Harness {
    pub client: Arc<ScriptedClient>,
    /// Retry backoff waits
    pub retry_sleeper: RecordingSleeper,
    /// Pacing delays and cooldowns
    pub throttle_sleeper: RecordingSleeper,
    /// Consecutive-failure penalty waits
    pub penalty_sleeper: RecordingSleeper,
    pub event_bus: EventBus,
    pub events: broadcast::Receiver<BatchEvent>,
    pub runner: BatchRunner,
}

pub fn harness(client: ScriptedClient, max_retries: u32) -> Harness {
    let client = Arc::new(client);
    let retry_sleeper = RecordingSleeper::new();
    let throttle_sleeper = RecordingSleeper::new();
    let penalty_sleeper = RecordingSleeper::new();
    let event_bus = EventBus::new(4096);
    let events = event_bus.subscribe();

    let retry = RetryPolicy::new(client.clone(), Arc::new(retry_sleeper.clone()), max_retries)
        .with_event_bus(event_bus.clone());
    let throttle = ThrottleController::new(
        ThrottleSettings::default(),
        Arc::new(throttle_sleeper.clone()),
    );
    let runner = BatchRunner::new(
        retry,
        throttle,
        Arc::new(penalty_sleeper.clone()),
        event_bus.clone(),
    );

    Harness {
        client,
        retry_sleeper,
        throttle_sleeper,
        penalty_sleeper,
        event_bus,
        events,
        runner,
    }
}

impl Harness {
    /// Events published so far
    pub fn drain_events(&mut self) -> Vec<BatchEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

/// Track name for 1-based position `n` ("Track 0001", ...)
pub fn track(n: usize) -> String {
    format!("Track {:04}", n)
}

/// `count` listens named `track(1)..=track(count)`, one minute apart
pub fn listens(count: usize) -> Vec<ListenEvent> {
    (1..=count)
        .map(|n| ListenEvent::new("Test Artist", track(n), "Test Album", 1_600_000_000 + 60 * n as i64))
        .collect()
}

pub fn permanent() -> SubmitError {
    SubmitError::Api {
        code: 6,
        message: "Invalid parameters".to_string(),
    }
}

pub fn transient() -> SubmitError {
    SubmitError::Server {
        status: 503,
        message: "Service Unavailable".to_string(),
    }
}
