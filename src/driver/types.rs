//! Driver types

use crate::engine::{WindowOutcome, WindowStatus};
use serde::Serialize;

/// Statistics from a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Records written to the sink
    pub records_synced: usize,
    /// Records read from the provider, before filtering
    pub records_processed: usize,
    /// Windows drained to the end
    pub windows_completed: usize,
    /// Windows given up after connectivity failures
    pub windows_abandoned: usize,
    /// Maintenance waits
    pub maintenance_outages: u32,
    /// Streams synced
    pub streams_synced: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record
    pub fn add_record(&mut self) {
        self.records_synced += 1;
    }

    /// Add a finished window
    pub fn add_window(&mut self, outcome: &WindowOutcome) {
        self.records_processed += outcome.processed;
        self.maintenance_outages += outcome.outages;
        match outcome.status {
            WindowStatus::Completed => self.windows_completed += 1,
            WindowStatus::Abandoned { .. } => self.windows_abandoned += 1,
        }
    }

    /// Add a stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }

    /// Fold another run's counters into these
    pub fn merge(&mut self, other: &SyncStats) {
        self.records_synced += other.records_synced;
        self.records_processed += other.records_processed;
        self.windows_completed += other.windows_completed;
        self.windows_abandoned += other.windows_abandoned;
        self.maintenance_outages += other.maintenance_outages;
        self.streams_synced += other.streams_synced;
        self.duration_ms += other.duration_ms;
    }
}
