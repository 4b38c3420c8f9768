//! Flattening module
//!
//! Converts a decoded record into a single-level [`FlatRecord`].
//!
//! # Rules
//!
//! Applied per field, first match wins:
//! 1. `addresses` - one address is projected as `address_*` keys
//! 2. collections - stored as an array of flattened elements (omitted when empty)
//! 3. decimals - converted to `f64`
//! 4. timestamps - UTC ISO-8601 strings
//! 5. dates - UTC midnight ISO-8601 strings
//! 6. nested objects - merged with a `<field>_` key prefix
//! 7. everything else - copied as-is

mod flattener;
mod record;

pub use flattener::{format_timestamp, Flattener};
pub use record::FlatRecord;
