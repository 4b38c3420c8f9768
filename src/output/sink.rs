//! Output messages and sinks

use crate::error::{Error, Result};
use crate::flatten::FlatRecord;
use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::io::{self, Write};

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// One flattened record
    Record {
        /// Stream name
        stream: String,
        /// The record
        data: FlatRecord,
        /// Emission time, milliseconds since the epoch
        emitted_at: i64,
    },
    /// State checkpoint for one stream
    State {
        /// Stream name
        stream: String,
        /// Serialized stream state
        data: JsonValue,
    },
    /// End-of-run summary
    Summary(JsonValue),
}

impl Message {
    /// Create a record message
    pub fn record(stream: impl Into<String>, data: FlatRecord, emitted_at: DateTime<Utc>) -> Self {
        Self::Record {
            stream: stream.into(),
            data,
            emitted_at: emitted_at.timestamp_millis(),
        }
    }

    /// Create a state message
    pub fn state(stream: impl Into<String>, data: JsonValue) -> Self {
        Self::State {
            stream: stream.into(),
            data,
        }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Wire representation
    pub fn to_json(&self) -> JsonValue {
        match self {
            Message::Record {
                stream,
                data,
                emitted_at,
            } => json!({
                "type": "RECORD",
                "record": {
                    "stream": stream,
                    "data": data,
                    "emitted_at": emitted_at
                }
            }),
            Message::State { stream, data } => json!({
                "type": "STATE",
                "state": {
                    "type": "STREAM",
                    "stream": {
                        "stream_descriptor": {
                            "name": stream
                        },
                        "stream_state": data
                    }
                }
            }),
            Message::Summary(summary) => json!({
                "type": "SYNC_SUMMARY",
                "summary": summary
            }),
        }
    }
}

/// Destination for sync messages
pub trait RecordSink: Send {
    /// Write one message
    fn emit(&mut self, message: Message) -> Result<()>;

    /// Flush buffered output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one JSON document per line
#[derive(Debug)]
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    pretty: bool,
}

impl JsonLinesSink<io::Stdout> {
    /// Sink writing to stdout
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Create a sink over any writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    /// Pretty-print each message (no longer one per line)
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Consume the sink, returning the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn emit(&mut self, message: Message) -> Result<()> {
        let value = message.to_json();
        let line = if self.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        writeln!(self.writer, "{line}")
            .map_err(|e| Error::output(format!("Failed to write message: {e}")))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::output(format!("Failed to flush output: {e}")))
    }
}

/// Keeps messages in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Vec<Message>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages, in emission order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Records emitted for a stream
    pub fn records(&self, stream: &str) -> Vec<&FlatRecord> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Record {
                    stream: s, data, ..
                } if s == stream => Some(data),
                _ => None,
            })
            .collect()
    }

    /// State payloads emitted for a stream
    pub fn states(&self, stream: &str) -> Vec<&JsonValue> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::State { stream: s, data } if s == stream => Some(data),
                _ => None,
            })
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn emit(&mut self, message: Message) -> Result<()> {
        self.messages.push(message);
        Ok(())
    }
}
