//! CLI module
//!
//! Command-line interface for running the extractor.
//!
//! # Commands
//!
//! - `check` - Validate config and run one small search
//! - `read` - Extract records from streams
//! - `streams` - List stream names

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
