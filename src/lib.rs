//! # Solidafy Braintree
//!
//! Incremental, windowed extraction of Braintree records into flat, typed rows.
//!
//! ## Features
//!
//! - **Windowed Search**: Splits the sync range into bounded time windows
//! - **Outage Handling**: Waits out maintenance, abandons windows on network failures
//! - **Incremental Sync**: Per-stream bookmark and watermark state
//! - **Flat Records**: Nested object graphs flattened into underscore-joined keys
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_braintree::{
//!     driver::ExtractionDriver, gateway::HttpGateway, output::JsonLinesSink,
//!     state::StateManager, streams::find_stream, TapConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> solidafy_braintree::Result<()> {
//!     let config = TapConfig::from_file("config.json")?;
//!     config.validate()?;
//!
//!     let gateway = Arc::new(HttpGateway::new(config.gateway_config())?);
//!     let state = StateManager::from_file("state.json")?;
//!     let mut driver = ExtractionDriver::new(gateway, config, state);
//!
//!     let mut sink = JsonLinesSink::stdout();
//!     driver.sync_stream(find_stream("transactions")?, &mut sink).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ExtractionDriver                        │
//! │  range + watermark from state → fetch → sink → save state    │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────┬────────────────┴─┬──────────────┬──────────────┐
//! │ WindowPlan  │ WindowedFetcher  │ RecordFilter │  Flattener   │
//! ├─────────────┼──────────────────┼──────────────┼──────────────┤
//! │ [start,end) │ Maintenance wait │ updated_at   │ address_*    │
//! │ ≤ N hours   │ Abandon window   │ histories    │ nested_*     │
//! └─────────────┴──────────────────┴──────────────┴──────────────┘
//!                                │
//!                    SearchGateway (HTTP, rate limited)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Typed record model and decoding
pub mod model;

/// Time window planning
pub mod window;

/// Watermark filtering
pub mod filter;

/// Record flattening
pub mod flatten;

/// Stream definitions
pub mod streams;

/// Search gateway trait and HTTP implementation
pub mod gateway;

/// Window-by-window fetch engine
pub mod engine;

/// Per-stream extraction driver
pub mod driver;

/// State management and checkpointing
pub mod state;

/// Output messages and sinks
pub mod output;

/// Configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::TapConfig;
pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
