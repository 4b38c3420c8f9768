//! Fetch engine module
//!
//! Window-by-window extraction with provider outage handling.
//!
//! # Overview
//!
//! The engine module provides:
//! - `WindowedFetcher` - turns a window plan into a lazy stream of events
//! - `FetchEvent` - flattened records and per-window outcomes
//! - `Sleeper` / `Clock` - time seams, swapped out in tests
//!
//! # Per-window state machine
//!
//! ```text
//! Fetching --maintenance--> Backoff (sleep) --> Fetching     (unbounded)
//! Fetching --connectivity--> Abandoned                       (next window)
//! Fetching --ok--> Draining --drained--> Done                (next window)
//! Draining --maintenance--> Backoff --> Fetching             (same window)
//! Draining --connectivity--> Abandoned                       (next window)
//! ```
//!
//! Any other error ends the stream.

mod types;

pub use types::{
    Clock, ExtractedRecord, FetchEvent, FetchScope, FixedClock, Sleeper, SystemClock,
    TokioSleeper, WindowOutcome, WindowStatus, DEFAULT_MAINTENANCE_BACKOFF,
};

use crate::error::{Error, Result};
use crate::filter::RecordFilter;
use crate::flatten::Flattener;
use crate::gateway::{ResultSet, SearchGateway};
use crate::model::Entity;
use crate::streams::StreamDef;
use crate::window::Window;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Fetches a stream's records window by window
pub struct WindowedFetcher {
    gateway: Arc<dyn SearchGateway>,
    sleeper: Arc<dyn Sleeper>,
    filter: RecordFilter,
    flattener: Flattener,
    maintenance_backoff: Duration,
}

impl WindowedFetcher {
    /// Create a fetcher with the tokio sleeper and a one hour backoff
    pub fn new(gateway: Arc<dyn SearchGateway>) -> Self {
        Self {
            gateway,
            sleeper: Arc::new(TokioSleeper),
            filter: RecordFilter::new(),
            flattener: Flattener::new(),
            maintenance_backoff: DEFAULT_MAINTENANCE_BACKOFF,
        }
    }

    /// Set the sleeper used for backoff
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Set the wait after a maintenance outage
    #[must_use]
    pub fn with_maintenance_backoff(mut self, backoff: Duration) -> Self {
        self.maintenance_backoff = backoff;
        self
    }

    /// Set the record flattener
    #[must_use]
    pub fn with_flattener(mut self, flattener: Flattener) -> Self {
        self.flattener = flattener;
        self
    }

    /// Wait after a maintenance outage
    pub fn maintenance_backoff(&self) -> Duration {
        self.maintenance_backoff
    }

    async fn open(&self, stream: &StreamDef, scope: FetchScope) -> Result<Box<dyn ResultSet>> {
        match scope {
            FetchScope::Window(window) => self.gateway.search(stream, window).await,
            FetchScope::All => self.gateway.all(stream).await,
        }
    }

    async fn wait_out_maintenance(
        &self,
        stream: &StreamDef,
        scope: FetchScope,
        outages: u32,
        e: &Error,
    ) {
        error!(
            "Provider down for maintenance while fetching {} from {} ({}). \
             Waiting {}s, then trying again (attempt {})",
            stream.name,
            scope,
            e,
            self.maintenance_backoff.as_secs(),
            outages + 1
        );
        self.sleeper.sleep(self.maintenance_backoff).await;
    }

    /// Fetch `stream` over the windows of `plan`.
    ///
    /// Windows are searched one after another; the next search starts only
    /// after the current result set is drained. Records not newer than
    /// `watermark` are dropped. Streams that are not windowed ignore `plan`
    /// and enumerate everything once, unfiltered.
    pub fn fetch<'a, I>(
        &'a self,
        stream: &'a StreamDef,
        plan: I,
        watermark: DateTime<Utc>,
    ) -> BoxStream<'a, Result<FetchEvent>>
    where
        I: IntoIterator<Item = Window>,
        I::IntoIter: Send + 'a,
    {
        let phase = if stream.is_windowed() {
            Phase::Idle
        } else {
            Phase::Fetching {
                scope: FetchScope::All,
                outages: 0,
            }
        };

        let run = FetchRun {
            fetcher: self,
            stream,
            plan: Box::new(plan.into_iter()),
            watermark,
            phase,
        };

        stream::try_unfold(run, FetchRun::step).boxed()
    }
}

impl std::fmt::Debug for WindowedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedFetcher")
            .field("filter", &self.filter)
            .field("flattener", &self.flattener)
            .field("maintenance_backoff", &self.maintenance_backoff)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch State Machine
// ============================================================================

enum Phase {
    Idle,
    Fetching { scope: FetchScope, outages: u32 },
    Draining(Drain),
    Finished,
}

struct Drain {
    scope: FetchScope,
    results: Box<dyn ResultSet>,
    advertised: usize,
    processed: usize,
    emitted: usize,
    last_id: Option<String>,
    outages: u32,
}

struct FetchRun<'a> {
    fetcher: &'a WindowedFetcher,
    stream: &'a StreamDef,
    plan: Box<dyn Iterator<Item = Window> + Send + 'a>,
    watermark: DateTime<Utc>,
    phase: Phase,
}

impl<'a> FetchRun<'a> {
    /// Advance until the next event is ready
    async fn step(mut self) -> Result<Option<(FetchEvent, Self)>> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Finished => return Ok(None),

                Phase::Idle => match self.plan.next() {
                    Some(window) => {
                        self.phase = Phase::Fetching {
                            scope: FetchScope::Window(window),
                            outages: 0,
                        };
                    }
                    None => return Ok(None),
                },

                Phase::Fetching { scope, outages } => {
                    let fetcher = self.fetcher;
                    let opened = fetcher.open(self.stream, scope).await;
                    match opened {
                        Ok(results) => {
                            let drain = self.start_draining(scope, results, outages);
                            self.phase = Phase::Draining(drain);
                        }
                        Err(e) if e.is_maintenance() => {
                            let outages = outages + 1;
                            let fetcher = self.fetcher;
                            fetcher.wait_out_maintenance(self.stream, scope, outages, &e).await;
                            self.phase = Phase::Fetching { scope, outages };
                        }
                        Err(e) if e.is_connectivity() => {
                            let outcome = self.abandon(scope, None, 0, 0, 0, outages, &e);
                            self.phase = next_phase(scope);
                            return Ok(Some((FetchEvent::WindowCompleted(outcome), self)));
                        }
                        Err(e) => return Err(e),
                    }
                }

                Phase::Draining(mut drain) => {
                    let next = drain.results.next_record().await;
                    match next {
                        Ok(Some(entity)) => {
                            drain.processed += 1;
                            drain.last_id = entity.id().map(str::to_string);
                            let extracted = self.extract(drain.scope, &entity);
                            if extracted.is_some() {
                                drain.emitted += 1;
                            }
                            self.phase = Phase::Draining(drain);
                            if let Some(record) = extracted {
                                return Ok(Some((FetchEvent::Record(record), self)));
                            }
                        }
                        Ok(None) => {
                            info!(
                                "Processed {} of {} {} from {} ({} emitted)",
                                drain.processed,
                                drain.advertised,
                                self.stream.name,
                                drain.scope,
                                drain.emitted
                            );
                            let outcome = WindowOutcome {
                                scope: drain.scope,
                                status: WindowStatus::Completed,
                                advertised: drain.advertised,
                                processed: drain.processed,
                                emitted: drain.emitted,
                                outages: drain.outages,
                            };
                            self.phase = next_phase(drain.scope);
                            return Ok(Some((FetchEvent::WindowCompleted(outcome), self)));
                        }
                        Err(e) if e.is_maintenance() => {
                            let outages = drain.outages + 1;
                            let fetcher = self.fetcher;
                            fetcher
                                .wait_out_maintenance(self.stream, drain.scope, outages, &e)
                                .await;
                            self.phase = Phase::Fetching {
                                scope: drain.scope,
                                outages,
                            };
                        }
                        Err(e) if e.is_connectivity() => {
                            let outcome = self.abandon(
                                drain.scope,
                                drain.last_id,
                                drain.advertised,
                                drain.processed,
                                drain.emitted,
                                drain.outages,
                                &e,
                            );
                            self.phase = next_phase(drain.scope);
                            return Ok(Some((FetchEvent::WindowCompleted(outcome), self)));
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    fn start_draining(
        &self,
        scope: FetchScope,
        results: Box<dyn ResultSet>,
        outages: u32,
    ) -> Drain {
        let advertised = results.maximum_size();
        info!("Fetched {} {} from {}", advertised, self.stream.name, scope);
        if advertised >= self.stream.max_results {
            error!(
                "Search for {} in {} advertised {} results, at or above the {} result limit; \
                 results may be truncated",
                self.stream.name, scope, advertised, self.stream.max_results
            );
        }
        Drain {
            scope,
            results,
            advertised,
            processed: 0,
            emitted: 0,
            last_id: None,
            outages,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn abandon(
        &self,
        scope: FetchScope,
        last_record_id: Option<String>,
        advertised: usize,
        processed: usize,
        emitted: usize,
        outages: u32,
        e: &Error,
    ) -> WindowOutcome {
        error!(
            "Connection failed while fetching {} from {}; last record id {}. \
             Abandoning the window: {}",
            self.stream.name,
            scope,
            last_record_id.as_deref().unwrap_or("<none>"),
            e
        );
        WindowOutcome {
            scope,
            status: WindowStatus::Abandoned {
                last_record_id,
                reason: e.to_string(),
            },
            advertised,
            processed,
            emitted,
            outages,
        }
    }

    /// Filter and flatten one record
    fn extract(&self, scope: FetchScope, entity: &Entity) -> Option<ExtractedRecord> {
        let fetcher = self.fetcher;

        if let FetchScope::Window(window) = scope {
            // the provider's range search is inclusive on both ends and
            // only resolves whole seconds
            if let Some(field) = self.stream.search_field() {
                if entity.timestamp(field).is_some_and(|ts| !window.contains(ts)) {
                    debug!(
                        "Skipping {} record {:?}: outside {}",
                        self.stream.name,
                        entity.id(),
                        window
                    );
                    return None;
                }
            }
            if !fetcher.filter.qualifies(entity, self.watermark) {
                return None;
            }
        }

        Some(ExtractedRecord {
            record: fetcher.flattener.flatten(entity),
            id: entity.id().map(str::to_string),
            replication_value: self
                .stream
                .replication_key
                .and_then(|key| entity.timestamp(key)),
            latest_change: fetcher.filter.latest_change(entity),
        })
    }
}

fn next_phase(scope: FetchScope) -> Phase {
    match scope {
        FetchScope::Window(_) => Phase::Idle,
        FetchScope::All => Phase::Finished,
    }
}

#[cfg(test)]
pub(crate) mod fakes;
