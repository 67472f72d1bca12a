//! The CSV codec.
//!
//! The header row is the union of field names across all records, in order of
//! first appearance. Nested values are JSON-encoded into single cells; nulls
//! become empty cells. `children` is never emitted. On parse, every non-empty
//! cell is first tried as JSON, keeping the raw string when that fails.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::CoreError;
use crate::record::{Record, FIELD_CHILDREN};

pub fn encode(records: &[Record]) -> Result<String, CoreError> {
    let mut columns: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for record in records {
        for key in record.keys() {
            if key != FIELD_CHILDREN && seen.insert(key) {
                columns.push(key);
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&columns)
        .map_err(|err| CoreError::from_csv(&err))?;

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| cell_for(record.get(*column)))
            .collect();
        writer
            .write_record(&row)
            .map_err(|err| CoreError::from_csv(&err))?;
    }

    let bytes = writer.into_inner().map_err(|err| CoreError::Decode {
        message: err.to_string(),
        line: None,
        column: None,
    })?;
    // The writer only ever receives UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn cell_for(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn decode(text: &str) -> Result<Vec<Record>, CoreError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| CoreError::from_csv(&err))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| CoreError::from_csv(&err))?;
        let mut record = Record::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            record.insert(header.to_string(), parse_cell(cell));
        }
        records.push(record);
    }
    Ok(records)
}

fn parse_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(cell).unwrap_or_else(|_| Value::String(cell.to_string()))
}
