//! Lookup-field policy: which fields identify a record of a given collection
//! on a different instance.
//!
//! Resolution order: caller-supplied config, then built-in defaults, then the
//! `name` fallback. The returned list is ordered; the first field with a
//! non-null value in the referent record wins.

use std::collections::HashMap;

use serde_json::Value;

use crate::record::Record;

/// Caller-supplied lookup configuration: collection name -> ordered lookup
/// field names.
pub type LookupConfig = HashMap<String, Vec<String>>;

/// Built-in lookup defaults for common collection types.
const DEFAULT_LOOKUPS: &[(&str, &[&str])] = &[
    ("users", &["email"]),
    ("companies", &["name"]),
    ("projects", &["name"]),
    ("tasks", &["name"]),
    ("roles", &["name"]),
    ("categories", &["name"]),
];

/// Fields tried, in order, when picking a human-readable label for a record.
pub const LABEL_FIELDS: &[&str] = &["name", "title", "label", "description"];

/// Ordered candidate lookup fields for a collection.
pub fn lookup_fields_for(resource_type: &str, config: Option<&LookupConfig>) -> Vec<String> {
    if let Some(fields) = config.and_then(|c| c.get(resource_type)) {
        if !fields.is_empty() {
            return fields.clone();
        }
    }

    if let Some((_, fields)) = DEFAULT_LOOKUPS.iter().find(|(r, _)| *r == resource_type) {
        return fields.iter().map(|f| f.to_string()).collect();
    }

    vec!["name".to_string()]
}

/// Pick the first lookup field with a non-null value in the referent record,
/// returning the field name and its value.
pub fn select_lookup<'a>(
    referent: &'a Record,
    lookup_fields: &[String],
) -> Option<(&'a str, &'a Value)> {
    for field in lookup_fields {
        if let Some((name, value)) = referent.get_key_value(field.as_str()) {
            if !value.is_null() {
                return Some((name.as_str(), value));
            }
        }
    }
    None
}

/// A human-readable label for a record: the collection's lookup fields first,
/// then the common label fields, then the record id.
pub fn display_label(record: &Record, resource_type: &str, config: Option<&LookupConfig>) -> String {
    let lookup_fields = lookup_fields_for(resource_type, config);
    if let Some((_, value)) = select_lookup(record, &lookup_fields) {
        if let Some(text) = value.as_str() {
            return text.to_string();
        }
    }

    for field in LABEL_FIELDS {
        match record.get(*field) {
            Some(Value::String(text)) if !text.is_empty() => return text.clone(),
            _ => {}
        }
    }

    record
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string()
}
