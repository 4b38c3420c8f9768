//! Stream definitions
//!
//! The record types the extractor knows about and how each one is fetched.

use crate::error::{Error, Result};
use crate::model::EntityKind;

/// How a stream's records are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Window-by-window search on a timestamp field
    Windowed {
        /// Field the search is scoped on
        search_field: &'static str,
    },
    /// One pass over every record, no windowing and no watermark filter
    FullEnumeration,
}

/// Static definition of a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDef {
    /// Stream name
    pub name: &'static str,
    /// Resource path segment on the gateway
    pub resource: &'static str,
    /// Entity kind of top-level records
    pub kind: EntityKind,
    /// Enumeration strategy
    pub fetch: FetchMode,
    /// Advertised result count at which the provider truncates a search
    pub max_results: usize,
    /// Lookback under the `regular` policy; `None` uses the start date
    pub regular_lookback_months: Option<u32>,
    /// Field whose maximum becomes the next run's range start
    pub replication_key: Option<&'static str>,
}

impl StreamDef {
    /// Search field for windowed streams
    pub fn search_field(&self) -> Option<&'static str> {
        match self.fetch {
            FetchMode::Windowed { search_field } => Some(search_field),
            FetchMode::FullEnumeration => None,
        }
    }

    /// Whether the stream is searched window by window
    pub fn is_windowed(&self) -> bool {
        matches!(self.fetch, FetchMode::Windowed { .. })
    }
}

/// All streams, in sync order
pub const STREAMS: &[StreamDef] = &[
    StreamDef {
        name: "transactions",
        resource: "transactions",
        kind: EntityKind::Transaction,
        fetch: FetchMode::Windowed {
            search_field: "created_at",
        },
        max_results: 50_000,
        regular_lookback_months: Some(1),
        replication_key: Some("created_at"),
    },
    StreamDef {
        name: "subscriptions",
        resource: "subscriptions",
        kind: EntityKind::Subscription,
        fetch: FetchMode::Windowed {
            search_field: "created_at",
        },
        max_results: 10_000,
        regular_lookback_months: Some(1),
        replication_key: None,
    },
    StreamDef {
        name: "customers",
        resource: "customers",
        kind: EntityKind::Customer,
        fetch: FetchMode::Windowed {
            search_field: "created_at",
        },
        max_results: 10_000,
        regular_lookback_months: None,
        replication_key: Some("created_at"),
    },
    StreamDef {
        name: "plans",
        resource: "plans",
        kind: EntityKind::Plan,
        fetch: FetchMode::FullEnumeration,
        max_results: 10_000,
        regular_lookback_months: None,
        replication_key: None,
    },
];

/// Look up a stream by name
pub fn find_stream(name: &str) -> Result<&'static StreamDef> {
    STREAMS
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| Error::StreamNotFound {
            stream: name.to_string(),
        })
}

/// Resolve a comma-separated selection; `None` or empty selects everything.
///
/// Selected streams keep the canonical sync order.
pub fn select_streams(selection: Option<&str>) -> Result<Vec<&'static StreamDef>> {
    let names: Vec<&str> = selection
        .map(|s| s.split(',').map(str::trim).filter(|n| !n.is_empty()).collect())
        .unwrap_or_default();

    if names.is_empty() {
        return Ok(STREAMS.iter().collect());
    }

    for name in &names {
        find_stream(name)?;
    }

    Ok(STREAMS.iter().filter(|s| names.contains(&s.name)).collect())
}
