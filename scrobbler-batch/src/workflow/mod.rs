//! Batch submission workflow

pub mod batch_runner;

pub use batch_runner::{BatchReport, BatchRunner, BatchState, RunState};
