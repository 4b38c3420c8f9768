//! Extraction driver module
//!
//! Runs one stream end to end: resolves the range and watermark from the
//! stream's saved state, walks the windows with the fetcher, forwards records
//! to the sink and persists the new state.
//!
//! Records reach the sink before state is saved, so a run that dies midway
//! replays from the old bookmark next time (at-least-once).

mod types;

pub use types::SyncStats;

use crate::config::TapConfig;
use crate::engine::{Clock, FetchEvent, Sleeper, SystemClock, WindowedFetcher};
use crate::error::Result;
use crate::gateway::SearchGateway;
use crate::output::{Message, RecordSink};
use crate::state::{StateManager, StreamState};
use crate::streams::StreamDef;
use crate::types::AbandonedWindowPolicy;
use crate::window::{Window, WindowPlanner};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Drives incremental extraction for each stream
pub struct ExtractionDriver {
    /// Fetch engine
    fetcher: WindowedFetcher,
    /// Extractor configuration
    config: TapConfig,
    /// State manager
    state: StateManager,
    /// Source of "now"
    clock: Arc<dyn Clock>,
    /// Statistics across every stream synced so far
    stats: SyncStats,
}

/// Range and watermark resolved for one run of a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunBounds {
    /// First instant searched
    pub start: DateTime<Utc>,
    /// End of the range (exclusive)
    pub end: DateTime<Utc>,
    /// Only records changed after this are emitted
    pub watermark: DateTime<Utc>,
}

impl ExtractionDriver {
    /// Create a driver over a gateway with the wall clock and tokio sleeper
    pub fn new(gateway: Arc<dyn SearchGateway>, config: TapConfig, state: StateManager) -> Self {
        let fetcher =
            WindowedFetcher::new(gateway).with_maintenance_backoff(config.maintenance_backoff());

        Self {
            fetcher,
            config,
            state,
            clock: Arc::new(SystemClock),
            stats: SyncStats::default(),
        }
    }

    /// Replace the sleeper used for maintenance backoff
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.fetcher = self.fetcher.with_sleeper(sleeper);
        self
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the configuration
    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Work out where this run of `stream` starts, ends and filters from
    pub fn bounds(&self, stream: &StreamDef, stream_state: &StreamState) -> Result<RunBounds> {
        let now = self.clock.now();
        let policy_start = self.config.sync_state.start_for(
            stream.regular_lookback_months,
            self.config.start_date()?,
            now,
        );

        let start = match (stream.replication_key, stream_state.bookmark) {
            (Some(_), Some(bookmark)) => bookmark,
            _ => policy_start,
        };

        // requeued windows can start before the bookmark
        let earliest = stream_state
            .incomplete_windows
            .iter()
            .map(|w| w.start)
            .fold(start, DateTime::min);

        let watermark = match stream_state.watermark {
            Some(w) => w,
            None => self.config.initial_watermark()?.unwrap_or(earliest),
        };

        Ok(RunBounds {
            start,
            end: now,
            watermark,
        })
    }

    /// Sync one stream into `sink`, returning this stream's statistics.
    ///
    /// Abandoned windows do not fail the run. Fatal errors are returned
    /// without touching the stream's saved state.
    pub async fn sync_stream(
        &mut self,
        stream: &StreamDef,
        sink: &mut dyn RecordSink,
    ) -> Result<SyncStats> {
        let started = Instant::now();
        let mut stream_state = self.state.stream_state(stream.name).await;
        let bounds = self.bounds(stream, &stream_state)?;

        let requeued = std::mem::take(&mut stream_state.incomplete_windows);
        if !requeued.is_empty() {
            info!(
                stream = stream.name,
                windows = requeued.len(),
                "Retrying windows left incomplete by the previous run"
            );
        }

        info!(
            stream = stream.name,
            start = %bounds.start,
            end = %bounds.end,
            watermark = %bounds.watermark,
            "Starting sync"
        );

        let planner = WindowPlanner::new(
            bounds.start,
            bounds.end,
            self.config.fetch_records_interval_hours,
        );
        let plan = requeued.into_iter().chain(planner);

        let mut stats = SyncStats::new();
        let mut abandoned: Vec<Window> = Vec::new();
        let mut max_replication: Option<DateTime<Utc>> = None;
        let mut max_change: Option<DateTime<Utc>> = None;

        let mut events = self.fetcher.fetch(stream, plan, bounds.watermark);
        while let Some(event) = events.try_next().await? {
            match event {
                FetchEvent::Record(extracted) => {
                    max_replication = max_of(max_replication, extracted.replication_value);
                    max_change = max_of(max_change, extracted.latest_change);
                    sink.emit(Message::record(
                        stream.name,
                        extracted.record,
                        self.clock.now(),
                    ))?;
                    stats.add_record();
                }
                FetchEvent::WindowCompleted(outcome) => {
                    stats.add_window(&outcome);
                    if outcome.is_abandoned() {
                        if let Some(window) = outcome.scope.window() {
                            abandoned.push(window);
                        }
                    }
                }
            }
        }
        drop(events);

        if let Some(bookmark) = max_replication {
            stream_state.advance_bookmark(bookmark);
        }

        match self.config.abandoned_windows {
            AbandonedWindowPolicy::Drop => {
                if let Some(change) = max_change {
                    stream_state.advance_watermark(change);
                }
            }
            AbandonedWindowPolicy::Requeue => {
                // held while windows wait for a retry
                if abandoned.is_empty() {
                    if let Some(change) = max_change {
                        stream_state.advance_watermark(change);
                    }
                } else {
                    warn!(
                        stream = stream.name,
                        windows = abandoned.len(),
                        "Windows requeued for the next run, watermark held"
                    );
                }
                stream_state.incomplete_windows = abandoned;
            }
        }

        self.state
            .set_stream_state(stream.name, stream_state.clone())
            .await?;
        sink.emit(Message::state(
            stream.name,
            serde_json::to_value(&stream_state)?,
        ))?;
        sink.flush()?;

        stats.add_stream();
        stats.set_duration(started.elapsed().as_millis() as u64);
        self.stats.merge(&stats);

        info!(
            stream = stream.name,
            records = stats.records_synced,
            windows = stats.windows_completed,
            abandoned = stats.windows_abandoned,
            "Finished sync"
        );

        Ok(stats)
    }
}

fn max_of(
    current: Option<DateTime<Utc>>,
    candidate: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

impl std::fmt::Debug for ExtractionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionDriver")
            .field("fetcher", &self.fetcher)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
