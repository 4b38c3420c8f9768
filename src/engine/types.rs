//! Engine types
//!
//! Events produced by the fetcher and the injectable time seams.

use crate::flatten::FlatRecord;
use crate::window::Window;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Default wait after a maintenance outage
pub const DEFAULT_MAINTENANCE_BACKOFF: Duration = Duration::from_secs(3600);

/// What a single search covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    /// One time window
    Window(Window),
    /// The whole collection
    All,
}

impl FetchScope {
    /// The window, if this scope is one
    pub fn window(&self) -> Option<Window> {
        match self {
            FetchScope::Window(w) => Some(*w),
            FetchScope::All => None,
        }
    }
}

impl fmt::Display for FetchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchScope::Window(w) => write!(f, "{w}"),
            FetchScope::All => write!(f, "all records"),
        }
    }
}

/// A record that passed filtering, ready for the sink
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    /// Flattened record
    pub record: FlatRecord,
    /// Provider id, if the record has one
    pub id: Option<String>,
    /// Value of the stream's replication key
    pub replication_value: Option<DateTime<Utc>>,
    /// Most recent change timestamp seen by the filter
    pub latest_change: Option<DateTime<Utc>>,
}

/// How a window ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowStatus {
    /// Result set fully drained
    Completed,
    /// Given up after a connectivity failure
    Abandoned {
        /// Id of the last record read before the failure
        last_record_id: Option<String>,
        /// Failure message
        reason: String,
    },
}

/// Summary of one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Window (or full enumeration) this outcome is for
    pub scope: FetchScope,
    /// Completion status
    pub status: WindowStatus,
    /// Total the provider advertised
    pub advertised: usize,
    /// Records read from the result set
    pub processed: usize,
    /// Records that passed filtering
    pub emitted: usize,
    /// Maintenance waits before the window finished
    pub outages: u32,
}

impl WindowOutcome {
    /// Whether the window was abandoned
    pub fn is_abandoned(&self) -> bool {
        matches!(self.status, WindowStatus::Abandoned { .. })
    }
}

/// Item of the fetcher's output stream
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// A record for the sink
    Record(ExtractedRecord),
    /// A window finished (drained or abandoned)
    WindowCompleted(WindowOutcome),
}

impl FetchEvent {
    /// Check if this is a record event
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }
}

// ============================================================================
// Time Seams
// ============================================================================

/// Suspends the fetcher during backoff
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for `duration`
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
