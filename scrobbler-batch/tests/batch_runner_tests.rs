//! Batch runner integration tests
//!
//! Runs are driven by a scripted client with recording sleepers, so every wait
//! the runner takes can be checked without real delays.

mod helpers;

use helpers::{harness, listens, permanent, track, transient, ScriptedClient};
use scrobbler_batch::models::Batch;
use scrobbler_batch::workflow::RunState;
use scrobbler_common::events::BatchEvent;
use std::time::Duration;

fn batch(name: &str, count: usize) -> Batch {
    Batch::new(name, 0, listens(count))
}

#[tokio::test]
async fn test_all_successful() {
    let mut h = harness(ScriptedClient::new(), 5);

    let report = h.runner.run(&batch("ok.json", 5)).await;

    assert_eq!(report.succeeded(), 5);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.skipped(), 0);
    assert!(!report.halted);
    assert!(report.state.failures.is_empty());
    assert_eq!(h.client.call_count(), 5);
    assert_eq!(h.throttle_sleeper.count(), 5);
    assert_eq!(h.penalty_sleeper.count(), 0);
    assert_eq!(h.retry_sleeper.count(), 0);
    assert_eq!(h.runner.run_state(), RunState::Completed);
}

#[tokio::test]
async fn test_empty_batch() {
    let mut h = harness(ScriptedClient::new(), 5);

    let report = h.runner.run(&batch("empty.json", 0)).await;

    assert_eq!(report.total, 0);
    assert_eq!(report.processed(), 0);
    assert_eq!(h.client.call_count(), 0);
    assert_eq!(h.throttle_sleeper.count(), 0);
    assert_eq!(
        report.summary(),
        "Finished scrobbling empty.json: 0 successful, 0 failed out of 0 songs."
    );
}

#[tokio::test]
async fn test_halts_after_eleven_consecutive_failures() {
    let client = (1..=11).fold(ScriptedClient::new(), |c, n| c.always(&track(n), permanent()));
    let mut h = harness(client, 5);

    let report = h.runner.run(&batch("halt.json", 20)).await;

    assert!(report.halted);
    assert_eq!(report.failed(), 11);
    assert_eq!(report.succeeded(), 0);
    assert_eq!(report.skipped(), 9);
    assert_eq!(report.state.failures.len(), 11);

    // Items 12..=20 are never attempted
    let calls = h.client.calls();
    assert_eq!(calls.len(), 11);
    assert_eq!(calls.last(), Some(&track(11)));

    assert_eq!(
        h.penalty_sleeper.recorded_secs(),
        vec![40, 50, 60, 60, 60, 60, 60, 60]
    );

    // No pacing delay after the halting item
    let pacing = h.throttle_sleeper.recorded();
    assert_eq!(pacing.len(), 10);
    assert!(pacing
        .iter()
        .all(|d| *d >= Duration::from_millis(400) && *d <= Duration::from_millis(600)));

    let events = h.drain_events();
    let failed_events = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::ItemFailed { .. }))
        .count();
    let penalty_events = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::PenaltyWait { .. }))
        .count();
    assert_eq!(failed_events, 11);
    assert_eq!(penalty_events, 8);
    assert_eq!(
        events.last(),
        Some(&BatchEvent::Halted {
            consecutive_errors: 11
        })
    );
    assert_eq!(h.runner.run_state(), RunState::Completed);
}

#[tokio::test]
async fn test_success_resets_failure_streak() {
    let client = [1, 2, 3, 4, 6, 7, 8]
        .iter()
        .fold(ScriptedClient::new(), |c, n| c.always(&track(*n), permanent()));
    let mut h = harness(client, 5);

    let report = h.runner.run(&batch("reset.json", 12)).await;

    assert!(!report.halted);
    assert_eq!(report.failed(), 7);
    assert_eq!(report.succeeded(), 5);
    // Only the fourth failure of the first streak is penalised
    assert_eq!(h.penalty_sleeper.recorded_secs(), vec![40]);
}

#[tokio::test]
async fn test_ten_consecutive_failures_do_not_halt() {
    let client = (1..=10)
        .chain(12..=21)
        .fold(ScriptedClient::new(), |c, n| c.always(&track(n), permanent()));
    let mut h = harness(client, 5);

    let report = h.runner.run(&batch("ten.json", 21)).await;

    assert!(!report.halted);
    assert_eq!(report.processed(), 21);
    assert_eq!(report.failed(), 20);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(h.client.call_count(), 21);

    let one_streak = vec![40, 50, 60, 60, 60, 60, 60];
    let expected: Vec<u64> = one_streak.iter().chain(one_streak.iter()).copied().collect();
    assert_eq!(h.penalty_sleeper.recorded_secs(), expected);
}

#[tokio::test]
async fn test_counters_add_up_to_processed() {
    let client = [2, 3, 5, 8, 13]
        .iter()
        .fold(ScriptedClient::new(), |c, n| c.always(&track(*n), permanent()));
    let mut h = harness(client, 5);

    let report = h.runner.run(&batch("mixed.json", 15)).await;

    assert_eq!(report.succeeded() + report.failed(), report.processed());
    assert_eq!(report.processed(), h.client.call_count());
    assert_eq!(report.failed(), report.state.failures.len());

    let failed_tracks: Vec<&str> = report
        .state
        .failures
        .iter()
        .map(|f| f.event.track_name.as_str())
        .collect();
    assert_eq!(
        failed_tracks,
        vec!["Track 0002", "Track 0003", "Track 0005", "Track 0008", "Track 0013"]
    );
}

#[tokio::test]
async fn test_failure_reason_recorded() {
    let client = ScriptedClient::new().always(&track(2), permanent());
    let mut h = harness(client, 5);

    let report = h.runner.run(&batch("reason.json", 3)).await;

    let failure = &report.state.failures[0];
    assert_eq!(failure.event.track_name, track(2));
    assert_eq!(failure.event.timestamp, 1_600_000_120);
    assert_eq!(failure.error, "API error: Last.fm error 6: Invalid parameters");

    let events = h.drain_events();
    assert!(events.contains(&BatchEvent::ItemFailed {
        position: 2,
        run_length: 3,
        artist: "Test Artist".to_string(),
        track: track(2),
        error: "API error: Last.fm error 6: Invalid parameters".to_string(),
    }));
}

#[tokio::test]
async fn test_transient_errors_retried_within_run() {
    let client =
        ScriptedClient::new().script(&track(2), vec![Err(transient()), Err(transient())]);
    let mut h = harness(client, 5);

    let report = h.runner.run(&batch("retry.json", 3)).await;

    assert_eq!(report.succeeded(), 3);
    assert_eq!(h.client.call_count(), 5);
    assert_eq!(h.retry_sleeper.recorded_secs(), vec![2, 4]);
    assert_eq!(h.penalty_sleeper.count(), 0);
}

#[tokio::test]
async fn test_progress_uses_source_positions() {
    // Resume at index 50 of a 250-item file; position 200 fails
    let events = listens(250).split_off(50);
    let client = ScriptedClient::new().always(&track(200), permanent());
    let mut h = harness(client, 5);

    let report = h.runner.run(&Batch::new("resume.json", 50, events)).await;

    assert_eq!(report.total, 200);
    assert_eq!(report.start_index, 50);
    assert_eq!(report.failed(), 1);

    let progress: Vec<BatchEvent> = h
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, BatchEvent::Progress { .. }))
        .collect();
    assert_eq!(
        progress,
        vec![BatchEvent::Progress {
            position: 100,
            total: 250,
            succeeded: 50,
            failed: 0,
        }]
    );
}

#[tokio::test]
async fn test_cooldown_counts_items_in_this_run() {
    let events = listens(750).split_off(250);
    let mut h = harness(ScriptedClient::new(), 5);

    let report = h.runner.run(&Batch::new("long.json", 250, events)).await;
    assert_eq!(report.succeeded(), 500);

    let cooldowns: Vec<Duration> = h
        .throttle_sleeper
        .recorded()
        .into_iter()
        .filter(|d| *d >= Duration::from_secs(1))
        .collect();
    assert_eq!(cooldowns, vec![Duration::from_secs(120)]);
    assert_eq!(h.throttle_sleeper.count(), 501);

    let events = h.drain_events();
    assert!(events.contains(&BatchEvent::Cooldown {
        processed: 500,
        wait_secs: 120,
    }));
    let progress_positions: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::Progress { position, .. } => Some(*position),
            _ => None,
        })
        .collect();
    assert_eq!(progress_positions, vec![300, 400, 500, 600, 700]);
}

#[tokio::test]
async fn test_runner_reusable_across_batches() {
    let client = ScriptedClient::new().always(&track(1), permanent());
    let mut h = harness(client, 5);

    let first = h.runner.run(&batch("first.json", 2)).await;
    let second = h.runner.run(&batch("second.json", 2)).await;

    // Counters are per run
    assert_eq!(first.failed(), 1);
    assert_eq!(second.failed(), 1);
    assert_eq!(second.succeeded(), 1);
    assert_eq!(second.file_name, "second.json");
}
