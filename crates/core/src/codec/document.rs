//! The JSON document codec.
//!
//! Emission is the record list as-is (the export pipeline nests it first when
//! tree output was requested). Parsing accepts both shapes and normalizes to
//! flat: when any top-level record carries a `children` array, the whole
//! document is flattened before it reaches the importer.

use serde_json::Value;

use crate::error::CoreError;
use crate::fields;
use crate::record::{Record, FIELD_CHILDREN};
use crate::tree;

pub fn encode(records: &[Record]) -> Result<String, CoreError> {
    serde_json::to_string_pretty(records).map_err(|err| CoreError::from_json(&err))
}

pub fn decode(text: &str) -> Result<Vec<Record>, CoreError> {
    let value: Value = serde_json::from_str(text).map_err(|err| CoreError::from_json(&err))?;

    let Value::Array(items) = value else {
        return Err(CoreError::NotAnArray);
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(record) => records.push(record),
            _ => {
                return Err(CoreError::Decode {
                    message: "Array elements must be objects".to_string(),
                    line: None,
                    column: None,
                })
            }
        }
    }

    if records.iter().any(|r| r.contains_key(FIELD_CHILDREN)) {
        let parent_field = fields::detect_parent_field(&records).unwrap_or("parent_id");
        records = tree::flatten(&records, parent_field);
    }

    Ok(records)
}
