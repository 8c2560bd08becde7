//! Data models for scrobble batches

pub mod batch;
pub mod listen_event;

pub use batch::Batch;
pub use listen_event::{FailedEvent, ListenEvent, RawListenEvent, SubmissionOutcome};
