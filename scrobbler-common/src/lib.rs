//! # Scrobbler Common Library
//!
//! Shared code for the scrobbler workspace including:
//! - Error types
//! - Configuration loading (TOML + environment) and credential resolution
//! - Batch event types and the EventBus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
