//! Window planner implementation

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default window width in hours
pub const DEFAULT_INTERVAL_HOURS: u32 = 24;

/// A half-open time interval `[start, end)` scoping one search query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl Window {
    /// Create a new window
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Width of the window
    pub fn width(&self) -> Duration {
        self.end - self.start
    }

    /// Whether a timestamp falls inside `[start, end)`
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Plans the windows covering `[start, end)`.
///
/// The planner itself is immutable; every call to [`WindowPlanner::iter`]
/// starts a fresh sequence.
#[derive(Debug, Clone)]
pub struct WindowPlanner {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl WindowPlanner {
    /// Create a planner with windows of at most `interval_hours`.
    ///
    /// A zero interval is treated as one hour; config validation rejects it
    /// before it gets here.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, interval_hours: u32) -> Self {
        Self {
            start,
            end,
            step: Duration::hours(i64::from(interval_hours.max(1))),
        }
    }

    /// Start of the planned range
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the planned range
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Maximum window width
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Iterate the windows lazily
    pub fn iter(&self) -> Windows {
        Windows {
            current: self.start,
            end: self.end,
            step: self.step,
        }
    }
}

impl IntoIterator for &WindowPlanner {
    type Item = Window;
    type IntoIter = Windows;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for WindowPlanner {
    type Item = Window;
    type IntoIter = Windows;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over planned windows
#[derive(Debug, Clone)]
pub struct Windows {
    current: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.current >= self.end {
            return None;
        }

        let next = self.current + self.step;
        let window_end = if next > self.end { self.end } else { next };
        let window = Window::new(self.current, window_end);
        self.current = window_end;
        Some(window)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a datetime string into UTC DateTime.
///
/// Strings without an offset are taken to be UTC.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in formats {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(ndt, Utc));
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(nd) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(
                nd.and_time(chrono::NaiveTime::MIN),
                Utc,
            ));
        }
    }

    Err(Error::config(format!("Invalid datetime format: {s}")))
}

/// Parse a `YYYY-MM-DD` watermark into UTC midnight
pub fn parse_watermark(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::invalid_value("watermark", format!("expected YYYY-MM-DD: {e}")))?;
    Ok(DateTime::from_naive_utc_and_offset(
        date.and_time(chrono::NaiveTime::MIN),
        Utc,
    ))
}
