//! The `_references` enrichment sidecar.
//!
//! Each entry describes how one FK value can be rediscovered on a different
//! instance: which collection it lives in, the source id it had, and the
//! discriminator field/value to query for.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{Record, FIELD_ORIGINAL_ID, FIELD_REFERENCES};

/// Reference metadata for a single FK field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefEntry {
    /// Collection name at the source (equals the record's own collection for
    /// self references).
    pub resource_type: String,
    /// The FK value at the source.
    pub original_id: String,
    /// Discriminator field on the referenced record.
    pub lookup_field: String,
    /// Value of the discriminator field.
    pub lookup_value: Value,
}

impl RefEntry {
    /// The entry recorded for a self reference. Self FKs resolve through the
    /// session id map on import; the `_original_id` lookup is a fallback.
    pub fn self_reference(resource_type: &str, original_id: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            original_id: original_id.to_string(),
            lookup_field: FIELD_ORIGINAL_ID.to_string(),
            lookup_value: Value::String(original_id.to_string()),
        }
    }
}

/// Parse a record's `_references` map. Entries that do not match the
/// [`RefEntry`] shape are dropped.
pub fn references_of(record: &Record) -> Vec<(String, RefEntry)> {
    let Some(Value::Object(map)) = record.get(FIELD_REFERENCES) else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(field, value)| {
            serde_json::from_value::<RefEntry>(value.clone())
                .ok()
                .map(|entry| (field.clone(), entry))
        })
        .collect()
}

/// Attach a `_references` map to a record. Entry order follows the order of
/// `entries`, which callers keep stable (field order of the record).
pub fn attach_references(record: &mut Record, entries: Vec<(String, RefEntry)>) {
    if entries.is_empty() {
        return;
    }
    let mut map = serde_json::Map::new();
    for (field, entry) in entries {
        // Serializing a RefEntry cannot fail; the type is plain data.
        if let Ok(value) = serde_json::to_value(&entry) {
            map.insert(field, value);
        }
    }
    record.insert(FIELD_REFERENCES.to_string(), Value::Object(map));
}
