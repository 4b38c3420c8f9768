//! Entity and field value types

use crate::types::JsonObject;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    // Top-level records
    Transaction,
    Subscription,
    Customer,
    Plan,

    // Nested objects merged into their parent with a key prefix
    Descriptor,
    DisbursementDetail,
    RiskData,
    TransactionDetail,

    // Collection elements
    Dispute,
    DisputeEvidence,
    StatusEvent,
    Discount,
    AddOn,
    Address,
}

impl EntityKind {
    /// Name used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Transaction => "transaction",
            EntityKind::Subscription => "subscription",
            EntityKind::Customer => "customer",
            EntityKind::Plan => "plan",
            EntityKind::Descriptor => "descriptor",
            EntityKind::DisbursementDetail => "disbursement_detail",
            EntityKind::RiskData => "risk_data",
            EntityKind::TransactionDetail => "transaction_detail",
            EntityKind::Dispute => "dispute",
            EntityKind::DisputeEvidence => "dispute_evidence",
            EntityKind::StatusEvent => "status_event",
            EntityKind::Discount => "discount",
            EntityKind::AddOn => "add_on",
            EntityKind::Address => "address",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// High-precision amount
    Decimal(Decimal),
    /// Timestamp with a time component, offset as received
    DateTime(DateTime<FixedOffset>),
    /// Calendar date without a time component
    Date(NaiveDate),
    /// Known nested object
    Entity(Box<Entity>),
    /// Ordered collection
    List(Vec<FieldValue>),
    /// Object under a key the entity's field list does not know
    Map(JsonObject),
}

impl FieldValue {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Timestamp view of this value, normalised to UTC.
    ///
    /// Dates count as UTC midnight; text is not parsed.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::DateTime(dt) => Some(dt.with_timezone(&Utc)),
            FieldValue::Date(d) => Some(DateTime::from_naive_utc_and_offset(
                d.and_time(NaiveTime::MIN),
                Utc,
            )),
            _ => None,
        }
    }

    /// String view of a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Entity view of a nested object
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            FieldValue::Entity(e) => Some(e),
            _ => None,
        }
    }
}

/// One node of a record's object graph
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    kind: EntityKind,
    fields: Vec<(String, FieldValue)>,
}

impl Entity {
    /// Create an empty entity
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
        }
    }

    /// Add a field, replacing an existing one with the same name
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing an existing one with the same name
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Entity type
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Fields in decode order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the entity has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Get a timestamp field in UTC
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(FieldValue::as_timestamp)
    }

    /// Get a text field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    /// Get a collection field; missing or non-list fields read as empty
    pub fn list(&self, name: &str) -> &[FieldValue] {
        match self.get(name) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    /// Record identifier, when present
    pub fn id(&self) -> Option<&str> {
        self.text("id")
    }
}
