//! Common error types for the scrobbler workspace

use thiserror::Error;

/// Common result type for scrobbler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across scrobbler crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input (malformed batch file, bad timestamp)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// One or more result artifacts could not be written
    #[error("Result log error: {0}")]
    ResultLog(String),
}
