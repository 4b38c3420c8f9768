//! Recursive flattener implementation

use super::record::FlatRecord;
use crate::model::{Entity, FieldValue};
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

const ADDRESSES: &str = "addresses";
const ADDRESS_PREFIX: &str = "address";
const COUNTRY_CODE: &str = "country_code_alpha2";

/// Flattens decoded records into [`FlatRecord`]s
#[derive(Debug, Clone, Default)]
pub struct Flattener {
    /// Keys dropped at every level
    excluded: HashSet<String>,
}

impl Flattener {
    /// Create a flattener with no excluded keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the named keys wherever they appear
    #[must_use]
    pub fn with_excluded_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Flatten a record
    pub fn flatten(&self, record: &Entity) -> FlatRecord {
        let mut out = JsonObject::new();
        self.flatten_entity_into(record, "", &mut out);
        FlatRecord::from_object(out)
    }

    /// Flatten any field value.
    ///
    /// Objects become flat objects, collections become arrays, and scalars
    /// come back normalised but otherwise unchanged.
    pub fn flatten_value(&self, value: &FieldValue) -> JsonValue {
        match value {
            FieldValue::Entity(entity) => JsonValue::Object(self.flatten(entity).into_object()),
            FieldValue::Map(map) => {
                let mut out = JsonObject::new();
                self.flatten_map_into(map, "", &mut out);
                JsonValue::Object(out)
            }
            FieldValue::List(items) => {
                JsonValue::Array(items.iter().map(|item| self.flatten_value(item)).collect())
            }
            scalar => scalar_to_json(scalar),
        }
    }

    fn flatten_entity_into(&self, entity: &Entity, prefix: &str, out: &mut JsonObject) {
        for (name, value) in entity.fields() {
            if self.excluded.contains(name) {
                continue;
            }
            let key = join_key(prefix, name);

            match value {
                FieldValue::List(items) if name == ADDRESSES => {
                    if let Some(address) = select_address(items) {
                        let address_prefix = join_key(prefix, ADDRESS_PREFIX);
                        match address {
                            FieldValue::Entity(a) => {
                                self.flatten_entity_into(a, &address_prefix, out);
                            }
                            FieldValue::Map(m) => self.flatten_map_into(m, &address_prefix, out),
                            _ => {}
                        }
                    }
                }
                FieldValue::List(items) => {
                    if !items.is_empty() {
                        let flattened = items.iter().map(|item| self.flatten_value(item)).collect();
                        out.insert(key, JsonValue::Array(flattened));
                    }
                }
                FieldValue::Entity(child) => self.flatten_entity_into(child, &key, out),
                FieldValue::Map(map) => self.flatten_map_into(map, &key, out),
                scalar => {
                    out.insert(key, scalar_to_json(scalar));
                }
            }
        }
    }

    fn flatten_map_into(&self, map: &JsonObject, prefix: &str, out: &mut JsonObject) {
        for (name, value) in map {
            if self.excluded.contains(name) {
                continue;
            }
            let key = join_key(prefix, name);

            match value {
                JsonValue::Object(child) => self.flatten_map_into(child, &key, out),
                JsonValue::Array(items) => {
                    if !items.is_empty() {
                        let flattened = items
                            .iter()
                            .map(|item| match item {
                                JsonValue::Object(child) => {
                                    let mut flat = JsonObject::new();
                                    self.flatten_map_into(child, "", &mut flat);
                                    JsonValue::Object(flat)
                                }
                                other => other.clone(),
                            })
                            .collect();
                        out.insert(key, JsonValue::Array(flattened));
                    }
                }
                scalar => {
                    out.insert(key, scalar.clone());
                }
            }
        }
    }
}

/// First address with a country code, else the first address
fn select_address(items: &[FieldValue]) -> Option<&FieldValue> {
    items
        .iter()
        .find(|item| has_country_code(item))
        .or_else(|| items.first())
}

fn has_country_code(item: &FieldValue) -> bool {
    match item {
        FieldValue::Entity(e) => e.get(COUNTRY_CODE).is_some_and(|v| !v.is_null()),
        FieldValue::Map(m) => m.get(COUNTRY_CODE).is_some_and(|v| !v.is_null()),
        _ => false,
    }
}

fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}_{name}")
    }
}

/// Format a timestamp as an explicit-offset UTC ISO-8601 string
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn scalar_to_json(value: &FieldValue) -> JsonValue {
    match value {
        FieldValue::Null => JsonValue::Null,
        FieldValue::Bool(b) => JsonValue::Bool(*b),
        FieldValue::Integer(i) => JsonValue::from(*i),
        FieldValue::Float(f) => float_to_json(*f),
        FieldValue::Text(s) => JsonValue::String(s.clone()),
        FieldValue::Decimal(d) => decimal_to_json(d),
        FieldValue::DateTime(dt) => JsonValue::String(format_timestamp(dt.with_timezone(&Utc))),
        FieldValue::Date(d) => JsonValue::String(format_timestamp(
            DateTime::from_naive_utc_and_offset(d.and_time(NaiveTime::MIN), Utc),
        )),
        FieldValue::Entity(_) | FieldValue::List(_) | FieldValue::Map(_) => JsonValue::Null,
    }
}

/// Correctly rounded conversion through the decimal's canonical text
fn decimal_to_json(d: &Decimal) -> JsonValue {
    d.to_string()
        .parse::<f64>()
        .map_or(JsonValue::Null, float_to_json)
}

fn float_to_json(f: f64) -> JsonValue {
    serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
}
