//! Record model module
//!
//! Typed representation of the object graphs returned by the search API.
//!
//! # Overview
//!
//! Every known entity type has an [`EntityKind`] with an explicit field
//! list. Decoding walks provider JSON with that list, so amounts become
//! decimals, timestamps become datetimes and nested objects become child
//! entities. Keys missing from a kind's list fall back to plain values
//! and generic maps.
//!
//! The graph is a tree: fields that point back at an owning record (a
//! dispute's transaction, a subscription's transactions) are declared as
//! references and never decoded, so traversal always terminates.

mod schema;
mod types;

pub use schema::{decode_record, FieldKind};
pub use types::{Entity, EntityKind, FieldValue};
