//! Output module
//!
//! Serializes sync messages for whoever consumes the extractor's output.
//!
//! # Overview
//!
//! This module provides:
//! - `Message` - record, state and summary messages
//! - `RecordSink` - where messages go
//! - `JsonLinesSink` - one JSON document per line (stdout by default)
//! - `MemorySink` - collects messages, for embedding and tests

mod sink;

pub use sink::{JsonLinesSink, MemorySink, Message, RecordSink};
