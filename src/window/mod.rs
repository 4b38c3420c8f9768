//! Window planning module
//!
//! Splits an extraction range into bounded, contiguous sub-windows.
//!
//! # Overview
//!
//! The provider only supports coarse, size-capped time-window searches, so
//! a sync run walks the range one window at a time:
//! - `Window` - a half-open `[start, end)` interval
//! - `WindowPlanner` - lazy, restartable window sequence for a range
//! - `parse_datetime` / `parse_watermark` - timestamp parsing helpers

mod planner;

pub use planner::{
    parse_datetime, parse_watermark, Window, WindowPlanner, Windows, DEFAULT_INTERVAL_HOURS,
};
