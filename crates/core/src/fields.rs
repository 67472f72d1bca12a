//! Foreign-key field classification.
//!
//! A field is a candidate foreign key when its name ends in `_id` or `_uuid`
//! and its value is a string. `parent_id`/`parent_uuid` point back into the
//! same collection (self references); every other candidate points at an
//! external collection inferred from the field-name prefix. A handful of
//! conventional audit fields (`assigned_to`, `created_by`, `updated_by`)
//! reference users without carrying the `_id` suffix.

use serde_json::Value;
use uuid::Uuid;

use crate::record::{Record, FIELD_ID, FIELD_ORIGINAL_ID};

/// Field names that mark a record as part of a parent/child tree.
pub const PARENT_FIELDS: &[&str] = &["parent_id", "parent_uuid"];

/// Conventional audit fields that reference `users` without an `_id` suffix.
/// Only recognised when the value is UUID-shaped, to avoid misreading free
/// text such as `assigned_to: "the backend team"`.
const USER_ALIAS_FIELDS: &[&str] = &["assigned_to", "created_by", "updated_by"];

/// Classification of a single record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldClass {
    /// Not a foreign key; carried through untouched.
    Scalar,
    /// References a record in the same collection (`parent_id`).
    SelfFk,
    /// References a record in another collection.
    ExternalFk { resource_type: String },
}

/// Classify a field name/value pair. Pure; no I/O.
pub fn classify(name: &str, value: &Value) -> FieldClass {
    let Value::String(text) = value else {
        return FieldClass::Scalar;
    };

    if name == FIELD_ID || name == FIELD_ORIGINAL_ID {
        return FieldClass::Scalar;
    }

    if PARENT_FIELDS.contains(&name) {
        return FieldClass::SelfFk;
    }

    if USER_ALIAS_FIELDS.contains(&name) && is_uuid_like(text) {
        return FieldClass::ExternalFk {
            resource_type: "users".to_string(),
        };
    }

    let prefix = name
        .strip_suffix("_id")
        .or_else(|| name.strip_suffix("_uuid"));
    match prefix {
        Some(base) if !base.is_empty() => FieldClass::ExternalFk {
            resource_type: pluralize(base),
        },
        _ => FieldClass::Scalar,
    }
}

/// Derive a collection name from an FK field prefix: `project` -> `projects`,
/// `status` -> `status` (already plural-shaped).
pub fn pluralize(base: &str) -> String {
    if base.ends_with('s') {
        base.to_string()
    } else {
        format!("{base}s")
    }
}

/// Whether a string has the shape of a UUID.
pub fn is_uuid_like(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

/// Find the parent field used by a record batch, if any record carries one.
pub fn detect_parent_field(records: &[Record]) -> Option<&'static str> {
    PARENT_FIELDS
        .iter()
        .find(|field| records.iter().any(|r| r.contains_key(**field)))
        .copied()
}
