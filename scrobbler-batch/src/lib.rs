//! scrobbler-batch library interface
//!
//! Submits batches of historical listen events to Last.fm, one at a time, with
//! per-item retry, request pacing, consecutive-failure circuit breaking, and
//! durable result logs so an interrupted or failed batch can be resumed.
//!
//! Exposes public APIs for the binary and for integration testing.

pub mod input;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

pub use crate::models::{Batch, FailedEvent, ListenEvent, SubmissionOutcome};
pub use crate::services::{ResultLog, SubmissionClient, SubmitError, ThrottleController};
pub use crate::utils::{RetryPolicy, Sleeper};
pub use crate::workflow::{BatchReport, BatchRunner, RunState};
