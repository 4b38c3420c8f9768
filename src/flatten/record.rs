//! Flat record type

use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

/// A single-level record: underscore-joined keys mapping to JSON scalars
/// or arrays of flat objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatRecord(JsonObject);

impl FlatRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_object(object: JsonObject) -> Self {
        Self(object)
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Get a string value by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(JsonValue::as_str)
    }

    /// Whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no keys
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    /// Borrow the underlying object
    pub fn as_object(&self) -> &JsonObject {
        &self.0
    }

    /// Consume into the underlying object
    pub fn into_object(self) -> JsonObject {
        self.0
    }
}

impl From<FlatRecord> for JsonValue {
    fn from(record: FlatRecord) -> Self {
        JsonValue::Object(record.0)
    }
}
