//! Services for scrobble submission

pub mod lastfm_client;
pub mod result_log;
pub mod submission_client;
pub mod throttle;

pub use lastfm_client::LastFmClient;
pub use result_log::ResultLog;
pub use submission_client::{ErrorClass, SubmissionClient, SubmitError};
pub use throttle::{ThrottleController, ThrottleSettings};
