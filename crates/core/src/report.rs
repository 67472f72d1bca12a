//! Import report and per-field resolution trace types.
//!
//! The report is the response body of an import request: aggregate counts,
//! the session id map, the ordered resolution traces, per-record errors, and
//! warnings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Candidates retained on an ambiguous resolution, beyond which the rest are
/// only counted.
pub const MAX_AMBIGUOUS_CANDIDATES: usize = 5;

/// Terminal state of the FK resolver for one field of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// A single target record was found (or the session id map already had
    /// the answer).
    Resolved,
    /// The lookup query returned no rows.
    Missing,
    /// The lookup query returned more than one row.
    Ambiguous,
}

/// One resolver outcome: which record, which field, how it ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionTrace {
    pub record_index: usize,
    pub field: String,
    pub status: ResolutionStatus,
    /// The discriminator used for the lookup query, when one was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_value: Option<Value>,
    /// The target id written into the record, for resolved outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,
    /// Distinguishing data for ambiguous outcomes, capped at
    /// [`MAX_AMBIGUOUS_CANDIDATES`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Value>,
}

/// A record that could not be created on the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFailure {
    pub record_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    /// HTTP status from the target, when the failure was a rejected POST.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
}

/// The full result of one import request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,

    /// Aggregate resolver outcome counts.
    pub resolved: usize,
    pub ambiguous: usize,
    pub missing: usize,

    /// Source id -> target id for every successfully created record.
    pub id_map: HashMap<String, String>,

    /// Per-field resolver outcomes in processing order.
    pub traces: Vec<ResolutionTrace>,
    pub errors: Vec<ImportFailure>,
    pub warnings: Vec<String>,

    pub duration_ms: u64,
}

impl ImportReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Record a resolver outcome, bumping the matching aggregate counter.
    pub fn trace(&mut self, trace: ResolutionTrace) {
        match trace.status {
            ResolutionStatus::Resolved => self.resolved += 1,
            ResolutionStatus::Missing => self.missing += 1,
            ResolutionStatus::Ambiguous => self.ambiguous += 1,
        }
        self.traces.push(trace);
    }

    /// Record a per-record failure.
    pub fn fail(&mut self, failure: ImportFailure) {
        self.failed += 1;
        self.errors.push(failure);
    }

    /// Map a source id to its newly assigned target id. Keys are written
    /// exactly once; later writes for the same source id are ignored.
    pub fn map_id(&mut self, original_id: String, new_id: String) {
        self.id_map.entry(original_id).or_insert(new_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_bumps_exactly_one_counter() {
        let mut report = ImportReport::new(1);
        report.trace(ResolutionTrace {
            record_index: 0,
            field: "assigned_to".into(),
            status: ResolutionStatus::Ambiguous,
            lookup_field: Some("email".into()),
            lookup_value: Some("j@x".into()),
            resolved_id: None,
            candidates: vec![],
        });
        assert_eq!(report.ambiguous, 1);
        assert_eq!(report.resolved, 0);
        assert_eq!(report.missing, 0);
        assert_eq!(report.traces.len(), 1);
    }

    #[test]
    fn id_map_entries_are_write_once() {
        let mut report = ImportReport::new(0);
        report.map_id("a".into(), "t1".into());
        report.map_id("a".into(), "t2".into());
        assert_eq!(report.id_map["a"], "t1");
    }

    #[test]
    fn report_serializes_without_empty_optionals() {
        let mut report = ImportReport::new(2);
        report.successful = 2;
        report.trace(ResolutionTrace {
            record_index: 1,
            field: "parent_id".into(),
            status: ResolutionStatus::Resolved,
            lookup_field: None,
            lookup_value: None,
            resolved_id: Some("t9".into()),
            candidates: vec![],
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["traces"][0]["status"], "resolved");
        assert_eq!(json["traces"][0]["resolved_id"], "t9");
        assert!(json["traces"][0].get("lookup_field").is_none());
        assert!(json["traces"][0].get("candidates").is_none());
    }
}
