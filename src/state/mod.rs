//! State management module
//!
//! Bookmark and watermark tracking between sync runs.
//! State is persisted between runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - per-stream state keyed by stream name
//! - `StreamState` - bookmark, watermark and windows left to retry
//! - `StateManager` - file-based state persistence

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{State, StreamState};
