//! Listen events and submission outcomes

use scrobbler_common::time::iso8601_to_unix;
use scrobbler_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One historical play of a track
///
/// Identity is the event's position in its batch. Fields not known to the
/// submitter are kept in `extra` so they survive into the failed-events log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenEvent {
    pub artist_name: String,
    pub track_name: String,
    /// Empty when the source had no album
    #[serde(default)]
    pub album_name: String,
    /// Unix seconds
    pub timestamp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListenEvent {
    pub fn new(
        artist_name: impl Into<String>,
        track_name: impl Into<String>,
        album_name: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            artist_name: artist_name.into(),
            track_name: track_name.into(),
            album_name: album_name.into(),
            timestamp,
            extra: Map::new(),
        }
    }
}

/// Listen event as found in a batch file, before defaults are applied
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListenEvent {
    pub artist_name: String,
    pub track_name: String,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Timestamp in either Unix seconds or `YYYY-MM-DDTHH:MM:SSZ` form
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Unix(i64),
    Text(String),
}

impl RawTimestamp {
    fn to_unix(&self) -> Result<i64> {
        match self {
            RawTimestamp::Unix(secs) => Ok(*secs),
            RawTimestamp::Text(text) => match text.trim().parse::<i64>() {
                Ok(secs) => Ok(secs),
                Err(_) => iso8601_to_unix(text),
            },
        }
    }
}

impl RawListenEvent {
    /// Apply defaults: empty album, `fallback_timestamp` when no timestamp is present
    pub fn into_event(self, fallback_timestamp: i64) -> Result<ListenEvent> {
        if self.artist_name.trim().is_empty() || self.track_name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "artistName and trackName must be non-empty".to_string(),
            ));
        }

        let timestamp = match &self.timestamp {
            Some(raw) => raw.to_unix()?,
            None => fallback_timestamp,
        };

        Ok(ListenEvent {
            artist_name: self.artist_name,
            track_name: self.track_name,
            album_name: self.album_name.unwrap_or_default(),
            timestamp,
            extra: self.extra,
        })
    }
}

/// Final result of submitting one event (after all attempts)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success,
    Failure { reason: String },
}

impl SubmissionOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        SubmissionOutcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success)
    }
}

/// Listen event that could not be submitted, with the reason attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEvent {
    #[serde(flatten)]
    pub event: ListenEvent,
    pub error: String,
}

impl FailedEvent {
    pub fn new(event: &ListenEvent, error: impl Into<String>) -> Self {
        let mut event = event.clone();
        // `error` is reserved for the failure reason
        event.extra.remove("error");
        Self {
            event,
            error: error.into(),
        }
    }
}
