//! Batch file loading
//!
//! A batch file is a JSON array of listen objects
//! (`artistName`, `trackName`, optional `albumName` and `timestamp`).

use crate::models::{Batch, ListenEvent, RawListenEvent};
use scrobbler_common::{Error, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Load a batch file and slice it at `start_index`
///
/// A `start_index` past the end yields an empty batch.
pub fn load_batch(path: &Path, start_index: usize, fallback_timestamp: i64) -> Result<Batch> {
    let content = std::fs::read_to_string(path)?;
    let events = parse_events(&content, fallback_timestamp)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidInput(format!("Not a file path: {}", path.display())))?;

    if start_index > events.len() {
        warn!(
            start_index,
            total = events.len(),
            "Start index is past the end of the batch, nothing to submit"
        );
    }

    let events: Vec<ListenEvent> = events.into_iter().skip(start_index).collect();
    debug!(file = %name, start_index, count = events.len(), "Loaded batch");

    Ok(Batch::new(name, start_index, events))
}

/// Parse a JSON array of listen objects, applying field defaults
pub fn parse_events(json: &str, fallback_timestamp: i64) -> Result<Vec<ListenEvent>> {
    let items: Vec<Value> = serde_json::from_str(json)?;

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let raw: RawListenEvent = serde_json::from_value(item)
                .map_err(|e| Error::InvalidInput(format!("Item {}: {}", index, e)))?;
            raw.into_event(fallback_timestamp)
                .map_err(|e| Error::InvalidInput(format!("Item {}: {}", index, e)))
        })
        .collect()
}
