//! The schemaless record model and its reserved fields.
//!
//! Records are opaque key/value maps at the engine boundary. The engine only
//! interprets the primary identifier `id`, the reserved migration fields
//! (`_original_id`, `_references`, `children`), and fields classified as
//! foreign keys by [`crate::fields`].

use serde_json::{Map, Value};

/// A single data record: a JSON-shaped mapping from field name to value.
///
/// Insertion order is preserved (serde_json's `preserve_order` feature), which
/// keeps CSV column ordering and `_references` entry ordering stable.
pub type Record = Map<String, Value>;

/// The primary identifier assigned by the owning service.
pub const FIELD_ID: &str = "id";

/// Preserves the source identifier across instances.
pub const FIELD_ORIGINAL_ID: &str = "_original_id";

/// Enrichment sidecar mapping FK field names to reference metadata.
pub const FIELD_REFERENCES: &str = "_references";

/// Nested child records, present only in nested-tree form.
pub const FIELD_CHILDREN: &str = "children";

/// Fields never sent to the target on import. `id` and the timestamps are
/// assigned by the target; the rest are migration metadata.
pub const READONLY_FIELDS: &[&str] = &[
    FIELD_ID,
    FIELD_ORIGINAL_ID,
    FIELD_REFERENCES,
    FIELD_CHILDREN,
    "created_at",
    "updated_at",
];

/// The source identifier of a record: `_original_id` when present, falling
/// back to `id`.
pub fn source_id(record: &Record) -> Option<&str> {
    record
        .get(FIELD_ORIGINAL_ID)
        .and_then(Value::as_str)
        .or_else(|| record.get(FIELD_ID).and_then(Value::as_str))
}

/// Copy `id` into `_original_id` if the record has an `id` and no
/// `_original_id` yet.
pub fn preserve_original_id(record: &mut Record) {
    if record.contains_key(FIELD_ORIGINAL_ID) {
        return;
    }
    if let Some(id) = record.get(FIELD_ID).cloned() {
        record.insert(FIELD_ORIGINAL_ID.to_string(), id);
    }
}

/// Return a copy of the record with all [`READONLY_FIELDS`] removed, ready to
/// be posted to a target endpoint.
pub fn strip_readonly(record: &Record) -> Record {
    record
        .iter()
        .filter(|(k, _)| !READONLY_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Render an identifier value as a string. Accepts strings directly and
/// stringifies numbers (some services hand out integer ids).
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn source_id_prefers_original_id() {
        let r = record(json!({"id": "new", "_original_id": "old"}));
        assert_eq!(source_id(&r), Some("old"));

        let r = record(json!({"id": "only"}));
        assert_eq!(source_id(&r), Some("only"));

        let r = record(json!({"name": "anonymous"}));
        assert_eq!(source_id(&r), None);
    }

    #[test]
    fn preserve_original_id_copies_once() {
        let mut r = record(json!({"id": "u1"}));
        preserve_original_id(&mut r);
        assert_eq!(r["_original_id"], "u1");

        // A second call must not overwrite an existing value.
        r.insert("id".into(), json!("u2"));
        preserve_original_id(&mut r);
        assert_eq!(r["_original_id"], "u1");
    }

    #[test]
    fn strip_readonly_removes_metadata_and_server_fields() {
        let r = record(json!({
            "id": "u1",
            "_original_id": "u1",
            "_references": {},
            "children": [],
            "created_at": "2024-01-01",
            "updated_at": "2024-01-02",
            "name": "kept",
            "parent_id": "p1"
        }));
        let clean = strip_readonly(&r);
        assert_eq!(clean.len(), 2);
        assert_eq!(clean["name"], "kept");
        assert_eq!(clean["parent_id"], "p1");
    }

    #[test]
    fn id_string_accepts_strings_and_numbers() {
        assert_eq!(id_string(&json!("abc")), Some("abc".into()));
        assert_eq!(id_string(&json!(42)), Some("42".into()));
        assert_eq!(id_string(&json!(null)), None);
        assert_eq!(id_string(&json!(["x"])), None);
    }
}
