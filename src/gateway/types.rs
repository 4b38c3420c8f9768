//! Gateway traits and in-memory result sets

use crate::error::Result;
use crate::model::Entity;
use crate::streams::StreamDef;
use crate::window::Window;
use async_trait::async_trait;
use std::collections::VecDeque;

/// Search capability of the record provider.
///
/// Failures are reported through the crate error type: a maintenance
/// outage as [`crate::Error::DownForMaintenance`], network trouble as
/// [`crate::Error::Timeout`] or [`crate::Error::Connection`].
#[async_trait]
pub trait SearchGateway: Send + Sync {
    /// Search a stream's records whose search field falls in `window`
    async fn search(&self, stream: &StreamDef, window: Window) -> Result<Box<dyn ResultSet>>;

    /// Enumerate every record of a stream
    async fn all(&self, stream: &StreamDef) -> Result<Box<dyn ResultSet>>;
}

/// A lazily drained search result
#[async_trait]
pub trait ResultSet: Send {
    /// Total number of results the provider advertised
    fn maximum_size(&self) -> usize;

    /// Next record, `None` once drained
    async fn next_record(&mut self) -> Result<Option<Entity>>;
}

/// Result set over records that are already in memory
#[derive(Debug, Clone, Default)]
pub struct BufferedResultSet {
    advertised: usize,
    records: VecDeque<Entity>,
}

impl BufferedResultSet {
    /// Create a result set advertising exactly its own length
    pub fn new(records: Vec<Entity>) -> Self {
        Self {
            advertised: records.len(),
            records: records.into(),
        }
    }

    /// Override the advertised total
    #[must_use]
    pub fn with_maximum_size(mut self, advertised: usize) -> Self {
        self.advertised = advertised;
        self
    }

    /// Records not yet drained
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl ResultSet for BufferedResultSet {
    fn maximum_size(&self) -> usize {
        self.advertised
    }

    async fn next_record(&mut self) -> Result<Option<Entity>> {
        Ok(self.records.pop_front())
    }
}
