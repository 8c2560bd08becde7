//! Submission client interface and error classification

use crate::models::ListenEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Last.fm error code: service offline
pub const LASTFM_SERVICE_OFFLINE: u32 = 11;
/// Last.fm error code: service temporarily unavailable
pub const LASTFM_TEMPORARILY_UNAVAILABLE: u32 = 16;
/// Last.fm error code: rate limit exceeded
pub const LASTFM_RATE_LIMIT_EXCEEDED: u32 = 29;

/// Submits one listen event to the remote service
///
/// Implementations perform exactly one remote call per `submit` and never sleep
/// or report progress; retry and pacing belong to the caller.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(&self, event: &ListenEvent) -> Result<(), SubmitError>;
}

/// Whether a failed submission is worth repeating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network, server, or rate-limit trouble; retry with backoff
    Transient,
    /// Service rejected the event; retrying cannot help
    Permanent,
    /// Client could not categorize the failure; not retried
    Unclassified,
}

/// Submission client errors
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Non-success HTTP status without a service error payload
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Error reported by the service in its response body
    #[error("Last.fm error {code}: {message}")]
    Api { code: u32, message: String },

    /// Service accepted the request but ignored the scrobble
    #[error("Scrobble ignored: {0}")]
    Rejected(String),

    #[error("{0}")]
    Unexpected(String),
}

impl SubmitError {
    pub fn classification(&self) -> ErrorClass {
        match self {
            SubmitError::Network(_)
            | SubmitError::Timeout(_)
            | SubmitError::MalformedResponse(_)
            | SubmitError::RateLimited(_) => ErrorClass::Transient,
            SubmitError::Server { status, .. } => match status {
                500 | 502 | 503 => ErrorClass::Transient,
                _ => ErrorClass::Permanent,
            },
            SubmitError::Api { code, .. } => match *code {
                LASTFM_SERVICE_OFFLINE
                | LASTFM_TEMPORARILY_UNAVAILABLE
                | LASTFM_RATE_LIMIT_EXCEEDED => ErrorClass::Transient,
                _ => ErrorClass::Permanent,
            },
            SubmitError::Rejected(_) => ErrorClass::Permanent,
            SubmitError::Unexpected(_) => ErrorClass::Unclassified,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.classification() == ErrorClass::Transient
    }

    /// Map a transport-level reqwest error
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SubmitError::Timeout(err.to_string())
        } else if err.is_decode() {
            SubmitError::MalformedResponse(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            SubmitError::Network(err.to_string())
        } else {
            SubmitError::Unexpected(err.to_string())
        }
    }

    /// Map an error code reported by Last.fm in a response body
    pub fn from_service_code(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == LASTFM_RATE_LIMIT_EXCEEDED {
            SubmitError::RateLimited(message)
        } else {
            SubmitError::Api { code, message }
        }
    }
}
