//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use crate::window::Window;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete state for the extractor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream state
    #[serde(default)]
    pub streams: BTreeMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.streams.entry(stream.to_string()).or_default()
    }

    /// Get the bookmark for a stream
    pub fn get_bookmark(&self, stream: &str) -> Option<DateTime<Utc>> {
        self.streams.get(stream)?.bookmark
    }

    /// Get the watermark for a stream
    pub fn get_watermark(&self, stream: &str) -> Option<DateTime<Utc>> {
        self.streams.get(stream)?.watermark
    }
}

/// State for a single stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Highest replication-key value emitted; next run's range start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<DateTime<Utc>>,

    /// Only records changed after this instant are emitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<DateTime<Utc>>,

    /// Windows abandoned last run, fetched first next run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incomplete_windows: Vec<Window>,
}

impl StreamState {
    /// Create a new empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the bookmark, never lowering it
    pub fn advance_bookmark(&mut self, value: DateTime<Utc>) {
        self.bookmark = Some(self.bookmark.map_or(value, |b| b.max(value)));
    }

    /// Raise the watermark, never lowering it
    pub fn advance_watermark(&mut self, value: DateTime<Utc>) {
        self.watermark = Some(self.watermark.map_or(value, |w| w.max(value)));
    }
}
