//! Watermark filtering
//!
//! Decides whether a fetched record carries changes newer than the stream's
//! watermark. Sub-collections are append-ordered by the provider, so only
//! their last entry is inspected.

use crate::model::{Entity, FieldValue};
use chrono::{DateTime, Utc};

/// A sub-collection checked for recent changes, and the timestamp field
/// of its entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryField {
    /// Collection field on the record
    pub collection: &'static str,
    /// Timestamp field on each entry
    pub timestamp: &'static str,
}

const DEFAULT_HISTORY: &[HistoryField] = &[
    HistoryField {
        collection: "status_history",
        timestamp: "timestamp",
    },
    HistoryField {
        collection: "disputes",
        timestamp: "updated_at",
    },
    HistoryField {
        collection: "discounts",
        timestamp: "updated_at",
    },
];

/// Watermark filter for raw records
#[derive(Debug, Clone)]
pub struct RecordFilter {
    root_field: &'static str,
    history: &'static [HistoryField],
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            root_field: "updated_at",
            history: DEFAULT_HISTORY,
        }
    }
}

impl RecordFilter {
    /// Create the standard filter (`updated_at` plus status history,
    /// disputes and discounts)
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the record changed strictly after `watermark`
    pub fn qualifies(&self, record: &Entity, watermark: DateTime<Utc>) -> bool {
        self.latest_change(record)
            .is_some_and(|latest| latest > watermark)
    }

    /// Most recent change timestamp visible to the filter
    pub fn latest_change(&self, record: &Entity) -> Option<DateTime<Utc>> {
        let root = record.timestamp(self.root_field);
        self.history
            .iter()
            .filter_map(|h| last_entry_timestamp(record, h))
            .chain(root)
            .max()
    }
}

fn last_entry_timestamp(record: &Entity, field: &HistoryField) -> Option<DateTime<Utc>> {
    match record.list(field.collection).last()? {
        FieldValue::Entity(entry) => entry.timestamp(field.timestamp),
        _ => None,
    }
}
