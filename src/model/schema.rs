//! Per-kind field lists and JSON decoding
//!
//! Only fields whose type needs more than a plain JSON value are listed;
//! anything else decodes through the generic path.

use super::types::{Entity, EntityKind, FieldValue};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use crate::window::parse_datetime;
use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;

/// How a listed field is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain JSON scalar
    Scalar,
    /// High-precision amount (string or number on the wire)
    Decimal,
    /// Timestamp with time component
    DateTime,
    /// Calendar date
    Date,
    /// Nested object of a known kind
    Entity(EntityKind),
    /// Collection of a known kind
    List(EntityKind),
    /// Points at a record owned elsewhere; never decoded
    Reference,
}

use FieldKind::{Date, DateTime as Timestamp, Decimal as Amount, Entity as Nested, List, Reference, Scalar};

const TRANSACTION: &[(&str, FieldKind)] = &[
    ("id", Scalar),
    ("amount", Amount),
    ("amount_requested", Amount),
    ("tax_amount", Amount),
    ("service_fee_amount", Amount),
    ("discount_amount", Amount),
    ("shipping_amount", Amount),
    ("created_at", Timestamp),
    ("updated_at", Timestamp),
    ("authorization_expires_at", Timestamp),
    ("descriptor", Nested(EntityKind::Descriptor)),
    ("disbursement_details", Nested(EntityKind::DisbursementDetail)),
    ("risk_data", Nested(EntityKind::RiskData)),
    ("disputes", List(EntityKind::Dispute)),
    ("status_history", List(EntityKind::StatusEvent)),
    ("discounts", List(EntityKind::Discount)),
    ("add_ons", List(EntityKind::AddOn)),
];

const SUBSCRIPTION: &[(&str, FieldKind)] = &[
    ("id", Scalar),
    ("balance", Amount),
    ("price", Amount),
    ("next_billing_period_amount", Amount),
    ("created_at", Timestamp),
    ("updated_at", Timestamp),
    ("billing_period_start_date", Date),
    ("billing_period_end_date", Date),
    ("first_billing_date", Date),
    ("next_billing_date", Date),
    ("paid_through_date", Date),
    ("descriptor", Nested(EntityKind::Descriptor)),
    ("discounts", List(EntityKind::Discount)),
    ("add_ons", List(EntityKind::AddOn)),
    ("disputes", List(EntityKind::Dispute)),
    ("status_history", List(EntityKind::StatusEvent)),
    ("transactions", Reference),
];

const CUSTOMER: &[(&str, FieldKind)] = &[
    ("id", Scalar),
    ("created_at", Timestamp),
    ("updated_at", Timestamp),
    ("addresses", List(EntityKind::Address)),
];

const PLAN: &[(&str, FieldKind)] = &[
    ("id", Scalar),
    ("price", Amount),
    ("created_at", Timestamp),
    ("updated_at", Timestamp),
    ("discounts", List(EntityKind::Discount)),
    ("add_ons", List(EntityKind::AddOn)),
];

const DESCRIPTOR: &[(&str, FieldKind)] = &[("name", Scalar), ("phone", Scalar), ("url", Scalar)];

const DISBURSEMENT_DETAIL: &[(&str, FieldKind)] = &[
    ("disbursement_date", Date),
    ("settlement_amount", Amount),
    ("settlement_currency_exchange_rate", Amount),
    ("settlement_base_currency_exchange_rate", Amount),
    ("settlement_currency_iso_code", Scalar),
    ("funds_held", Scalar),
    ("success", Scalar),
];

const RISK_DATA: &[(&str, FieldKind)] = &[
    ("id", Scalar),
    ("decision", Scalar),
    ("device_data_captured", Scalar),
    ("fraud_service_provider", Scalar),
];

const TRANSACTION_DETAIL: &[(&str, FieldKind)] = &[("id", Scalar), ("amount", Amount)];

const DISPUTE: &[(&str, FieldKind)] = &[
    ("id", Scalar),
    ("amount", Amount),
    ("amount_disputed", Amount),
    ("amount_won", Amount),
    ("created_at", Timestamp),
    ("updated_at", Timestamp),
    ("response_deadline", Timestamp),
    ("date_opened", Date),
    ("date_won", Date),
    ("received_date", Date),
    ("reply_by_date", Date),
    ("processor_reply_by_date", Date),
    ("evidence", List(EntityKind::DisputeEvidence)),
    ("status_history", List(EntityKind::StatusEvent)),
    ("transaction_details", Nested(EntityKind::TransactionDetail)),
    ("transaction", Reference),
];

const DISPUTE_EVIDENCE: &[(&str, FieldKind)] = &[
    ("id", Scalar),
    ("created_at", Timestamp),
    ("sent_to_processor_at", Timestamp),
];

const STATUS_EVENT: &[(&str, FieldKind)] = &[
    ("amount", Amount),
    ("timestamp", Timestamp),
    ("effective_date", Date),
    ("disbursement_date", Date),
];

const DISCOUNT: &[(&str, FieldKind)] = &[
    ("id", Scalar),
    ("amount", Amount),
    ("created_at", Timestamp),
    ("updated_at", Timestamp),
];

const ADDRESS: &[(&str, FieldKind)] = &[
    ("id", Scalar),
    ("country_code_alpha2", Scalar),
    ("created_at", Timestamp),
    ("updated_at", Timestamp),
];

impl EntityKind {
    /// Explicit field list for this kind
    pub fn fields(self) -> &'static [(&'static str, FieldKind)] {
        match self {
            EntityKind::Transaction => TRANSACTION,
            EntityKind::Subscription => SUBSCRIPTION,
            EntityKind::Customer => CUSTOMER,
            EntityKind::Plan => PLAN,
            EntityKind::Descriptor => DESCRIPTOR,
            EntityKind::DisbursementDetail => DISBURSEMENT_DETAIL,
            EntityKind::RiskData => RISK_DATA,
            EntityKind::TransactionDetail => TRANSACTION_DETAIL,
            EntityKind::Dispute => DISPUTE,
            EntityKind::DisputeEvidence => DISPUTE_EVIDENCE,
            EntityKind::StatusEvent => STATUS_EVENT,
            EntityKind::Discount | EntityKind::AddOn => DISCOUNT,
            EntityKind::Address => ADDRESS,
        }
    }

    /// Look up how a field of this kind decodes
    pub fn field_kind(self, name: &str) -> Option<FieldKind> {
        self.fields()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, k)| *k)
    }
}

/// Decode a top-level record returned by the gateway
pub fn decode_record(kind: EntityKind, value: &JsonValue) -> Result<Entity> {
    match value {
        JsonValue::Object(_) => Ok(decode_entity(kind, value)),
        other => Err(Error::search_response(format!(
            "expected {kind} object, got {}",
            json_type_name(other)
        ))),
    }
}

fn decode_entity(kind: EntityKind, value: &JsonValue) -> Entity {
    let mut entity = Entity::new(kind);
    let Some(object) = value.as_object() else {
        return entity;
    };

    for (name, raw) in object {
        let decoded = match kind.field_kind(name) {
            Some(FieldKind::Reference) => continue,
            Some(field_kind) => decode_typed(kind, name, field_kind, raw),
            None => decode_generic(raw),
        };
        entity.set(name.clone(), decoded);
    }

    entity
}

fn decode_typed(owner: EntityKind, name: &str, kind: FieldKind, raw: &JsonValue) -> FieldValue {
    if raw.is_null() {
        return FieldValue::Null;
    }

    let decoded = match kind {
        FieldKind::Scalar | FieldKind::Reference => None,
        FieldKind::Decimal => decode_decimal(raw).map(FieldValue::Decimal),
        FieldKind::DateTime => raw
            .as_str()
            .and_then(decode_timestamp)
            .map(FieldValue::DateTime),
        FieldKind::Date => raw.as_str().and_then(decode_date),
        FieldKind::Entity(child) => raw
            .is_object()
            .then(|| FieldValue::Entity(Box::new(decode_entity(child, raw)))),
        FieldKind::List(child) => raw.as_array().map(|items| {
            FieldValue::List(
                items
                    .iter()
                    .map(|item| {
                        if item.is_object() {
                            FieldValue::Entity(Box::new(decode_entity(child, item)))
                        } else {
                            decode_generic(item)
                        }
                    })
                    .collect(),
            )
        }),
    };

    decoded.unwrap_or_else(|| {
        if kind != FieldKind::Scalar {
            debug!(
                entity = %owner,
                field = name,
                "field did not match its declared type, keeping raw value"
            );
        }
        decode_generic(raw)
    })
}

/// Decode a value with no declared type
fn decode_generic(raw: &JsonValue) -> FieldValue {
    match raw {
        JsonValue::Null => FieldValue::Null,
        JsonValue::Bool(b) => FieldValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => FieldValue::Text(s.clone()),
        JsonValue::Array(items) => FieldValue::List(items.iter().map(decode_generic).collect()),
        JsonValue::Object(map) => FieldValue::Map(map.clone()),
    }
}

fn decode_decimal(raw: &JsonValue) -> Option<Decimal> {
    match raw {
        JsonValue::String(s) => s.trim().parse().ok(),
        JsonValue::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn decode_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| parse_datetime(s).ok().map(|dt| dt.fixed_offset()))
}

fn decode_date(s: &str) -> Option<FieldValue> {
    if let Ok(date) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        return Some(FieldValue::Date(date));
    }
    // Some endpoints send dates as full timestamps
    decode_timestamp(s).map(FieldValue::DateTime)
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
