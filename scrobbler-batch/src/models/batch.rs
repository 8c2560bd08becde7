//! Materialized batch of listen events

use super::ListenEvent;

/// Ordered listen events from one source file, already sliced at `start_index`
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Source file base name, recorded in the processed-files log
    pub name: String,
    /// Offset into the source file where this run begins
    pub start_index: usize,
    pub events: Vec<ListenEvent>,
}

impl Batch {
    pub fn new(name: impl Into<String>, start_index: usize, events: Vec<ListenEvent>) -> Self {
        Self {
            name: name.into(),
            start_index,
            events,
        }
    }

    /// Number of events submitted by this run
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index one past the last event in the source file
    pub fn source_len(&self) -> usize {
        self.start_index + self.events.len()
    }
}
