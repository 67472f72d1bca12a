//! The import pipeline: decode, flatten, order, then stream records to the
//! target while rebinding every FK field.
//!
//! Records are processed strictly in dependency order on a single task, so a
//! self FK is always resolvable from the session id map by the time its
//! owning record is posted. Per-record errors never cross the record
//! boundary; only transport-level failures abort the request.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use axum::http::StatusCode;
use ferry_client::{url, Credential, UpstreamError};
use ferry_core::codec::{self, Format};
use ferry_core::fields::{classify, detect_parent_field, FieldClass};
use ferry_core::record::{id_string, preserve_original_id, source_id, strip_readonly, Record};
use ferry_core::refs::{references_of, RefEntry};
use ferry_core::report::{
    ImportFailure, ImportReport, ResolutionStatus, ResolutionTrace, MAX_AMBIGUOUS_CANDIDATES,
};
use ferry_core::topo;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// What to do when a reference resolves to zero or to several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Null the FK, record the outcome, keep going.
    #[default]
    Skip,
    /// Abort the whole import with a 400-class report.
    Fail,
}

impl Policy {
    pub fn parse(name: &str) -> Result<Self, String> {
        match name.to_ascii_lowercase().as_str() {
            "skip" => Ok(Policy::Skip),
            "fail" => Ok(Policy::Fail),
            other => Err(format!("Invalid mode: {other}. Must be 'skip' or 'fail'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Target collection endpoint.
    pub url: String,
    pub format: Format,
    pub on_ambiguous: Policy,
    pub on_missing: Policy,
    pub detect_cycles: bool,
}

/// How the resolver left one FK field.
enum FieldOutcome {
    /// Write this id into the field.
    Resolved(String),
    /// Null the field (skip policy).
    Cleared,
    /// Leave the source value in place (no metadata to resolve with).
    Verbatim,
    /// The record cannot be posted (unresolvable in-batch parent).
    FailRecord(String),
    /// Fail policy hit; stop the whole import.
    AbortImport(String),
}

pub async fn run(
    state: &AppState,
    credential: &Credential,
    opts: ImportOptions,
    body: &str,
) -> AppResult<(StatusCode, ImportReport)> {
    let started = Instant::now();

    // -- Decode --
    let mut records = codec::decode(opts.format, body)?;
    tracing::info!(count = records.len(), format = ?opts.format, "Decoded import payload");

    // -- Prepare --
    for record in records.iter_mut() {
        preserve_original_id(record);
    }

    let mut report = ImportReport::new(records.len());

    let parent_field = detect_parent_field(&records);
    if let Some(field) = parent_field {
        let (ordered, cycles) = topo::topo_sort(records, field, opts.detect_cycles);
        records = ordered;
        if let Some(cycles) = cycles {
            tracing::warn!(ids = ?cycles.ids, "Circular parent references detected");
            report.warnings.push(format!(
                "Circular parent references detected among: {}",
                cycles.ids.join(", ")
            ));
        }
    }

    let batch_ids: HashSet<String> = records
        .iter()
        .filter_map(|r| source_id(r).map(str::to_string))
        .collect();

    let base_url = url::base_of(&opts.url);
    let mut aborted = false;

    // -- Iterate in order --
    for (idx, record) in records.iter().enumerate() {
        let original_id = source_id(record).map(str::to_string);
        let references: HashMap<String, RefEntry> = references_of(record).into_iter().collect();
        let mut working = record.clone();
        let mut record_error: Option<String> = None;

        for (field, value) in record.iter() {
            // A field takes part in resolution when its name classifies as an
            // FK or when the exporter attached lookup metadata for it. Null
            // values never produce a resolution attempt.
            let class = classify(field, value);
            if value.is_null() || (class == FieldClass::Scalar && !references.contains_key(field)) {
                continue;
            }
            let fk_value = value.as_str().unwrap_or_default().to_string();

            let outcome = resolve_field(
                state,
                credential,
                &base_url,
                idx,
                field,
                &class,
                &fk_value,
                references.get(field),
                &batch_ids,
                &opts,
                &mut report,
            )
            .await?;

            match outcome {
                FieldOutcome::Resolved(id) => {
                    working.insert(field.clone(), Value::String(id));
                }
                FieldOutcome::Cleared => {
                    working.insert(field.clone(), Value::Null);
                }
                FieldOutcome::Verbatim => {
                    report.warnings.push(format!(
                        "No reference metadata for field '{field}' on record {idx}; \
                         source value carried through"
                    ));
                }
                FieldOutcome::FailRecord(message) => {
                    record_error = Some(message);
                    break;
                }
                FieldOutcome::AbortImport(message) => {
                    report.fail(ImportFailure {
                        record_index: idx,
                        original_id: original_id.clone(),
                        status: None,
                        message,
                    });
                    aborted = true;
                    break;
                }
            }
        }

        if aborted {
            break;
        }

        if let Some(message) = record_error {
            tracing::warn!(record_index = idx, error = %message, "Record skipped");
            report.fail(ImportFailure {
                record_index: idx,
                original_id,
                status: None,
                message,
            });
            continue;
        }

        // -- Strip reserved fields and post --
        let clean = strip_readonly(&working);
        match state.client.create(&opts.url, &clean, credential).await {
            Ok(created) => {
                report.successful += 1;
                let new_id = created.get("id").and_then(id_string);
                if let (Some(original), Some(new_id)) = (original_id, new_id) {
                    tracing::debug!(original = %original, new = %new_id, "Created record");
                    report.map_id(original, new_id);
                }
            }
            Err(UpstreamError::Rejected { status, body }) => {
                tracing::warn!(record_index = idx, status, "Target rejected record");
                report.fail(ImportFailure {
                    record_index: idx,
                    original_id,
                    status: Some(status),
                    message: format!("Target rejected record: HTTP {status} - {body}"),
                });
            }
            Err(UpstreamError::Payload(message)) => {
                report.fail(ImportFailure {
                    record_index: idx,
                    original_id,
                    status: None,
                    message: format!("Target returned an unreadable created record: {message}"),
                });
            }
            // Transport failures are fatal for the whole request.
            Err(err @ UpstreamError::Transport(_)) => return Err(AppError::Upstream(err)),
        }
    }

    report.duration_ms = started.elapsed().as_millis() as u64;

    let status = if aborted {
        StatusCode::BAD_REQUEST
    } else if report.failed == 0 {
        StatusCode::CREATED
    } else if report.successful > 0 {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::BAD_REQUEST
    };

    tracing::info!(
        successful = report.successful,
        failed = report.failed,
        duration_ms = report.duration_ms,
        "Import completed"
    );

    Ok((status, report))
}

/// Drive the per-field resolver state machine for one FK field.
#[allow(clippy::too_many_arguments)]
async fn resolve_field(
    state: &AppState,
    credential: &Credential,
    base_url: &str,
    record_index: usize,
    field: &str,
    class: &FieldClass,
    fk_value: &str,
    entry: Option<&RefEntry>,
    batch_ids: &HashSet<String>,
    opts: &ImportOptions,
    report: &mut ImportReport,
) -> AppResult<FieldOutcome> {
    // A self FK whose source id is already mapped bypasses lookups.
    if *class == FieldClass::SelfFk {
        let source = entry.map_or(fk_value, |e| e.original_id.as_str());
        for candidate in [fk_value, source] {
            if let Some(mapped) = report.id_map.get(candidate) {
                let mapped = mapped.clone();
                report.trace(ResolutionTrace {
                    record_index,
                    field: field.to_string(),
                    status: ResolutionStatus::Resolved,
                    lookup_field: None,
                    lookup_value: None,
                    resolved_id: Some(mapped.clone()),
                    candidates: vec![],
                });
                return Ok(FieldOutcome::Resolved(mapped));
            }
        }

        // The parent belongs to this batch but was never created (cycle, or
        // its own import failed). The record cannot point anywhere sensible.
        if batch_ids.contains(source) {
            return Ok(FieldOutcome::FailRecord(format!(
                "Could not resolve '{field}': parent record '{source}' was not created on the target"
            )));
        }
    }

    // Resolve through the lookup metadata attached at export time.
    if let Some(entry) = entry {
        return lookup_reference(state, credential, base_url, record_index, field, entry, opts, report)
            .await;
    }

    // No metadata and no session mapping; the source id is carried through
    // verbatim.
    Ok(FieldOutcome::Verbatim)
}

/// Issue the lookup query for one `_references` entry and classify the
/// result count.
#[allow(clippy::too_many_arguments)]
async fn lookup_reference(
    state: &AppState,
    credential: &Credential,
    base_url: &str,
    record_index: usize,
    field: &str,
    entry: &RefEntry,
    opts: &ImportOptions,
    report: &mut ImportReport,
) -> AppResult<FieldOutcome> {
    let matches = match state
        .client
        .find_by(
            base_url,
            &entry.resource_type,
            &entry.lookup_field,
            &entry.lookup_value,
            credential,
        )
        .await
    {
        Ok(matches) => matches,
        // A rejected lookup means the target cannot answer for this
        // collection; the reference is as good as missing.
        Err(UpstreamError::Rejected { status, .. }) => {
            tracing::warn!(
                field,
                resource_type = %entry.resource_type,
                status,
                "Lookup query rejected; treating reference as missing"
            );
            Vec::new()
        }
        Err(err) => return Err(AppError::Upstream(err)),
    };

    match matches.len() {
        1 => {
            let resolved = matches[0].get("id").and_then(id_string);
            let Some(resolved) = resolved else {
                // A match without an id cannot be pointed at.
                return missing_outcome(record_index, field, entry, opts, report);
            };
            report.trace(ResolutionTrace {
                record_index,
                field: field.to_string(),
                status: ResolutionStatus::Resolved,
                lookup_field: Some(entry.lookup_field.clone()),
                lookup_value: Some(entry.lookup_value.clone()),
                resolved_id: Some(resolved.clone()),
                candidates: vec![],
            });
            Ok(FieldOutcome::Resolved(resolved))
        }
        0 => missing_outcome(record_index, field, entry, opts, report),
        _ => {
            let candidates: Vec<Value> = matches
                .iter()
                .take(MAX_AMBIGUOUS_CANDIDATES)
                .map(|candidate| {
                    let mut distinguishing = Record::new();
                    distinguishing.insert(
                        "id".to_string(),
                        candidate.get("id").cloned().unwrap_or(Value::Null),
                    );
                    distinguishing.insert(
                        entry.lookup_field.clone(),
                        candidate
                            .get(&entry.lookup_field)
                            .cloned()
                            .unwrap_or(Value::Null),
                    );
                    Value::Object(distinguishing)
                })
                .collect();

            report.trace(ResolutionTrace {
                record_index,
                field: field.to_string(),
                status: ResolutionStatus::Ambiguous,
                lookup_field: Some(entry.lookup_field.clone()),
                lookup_value: Some(entry.lookup_value.clone()),
                resolved_id: None,
                candidates,
            });

            match opts.on_ambiguous {
                Policy::Skip => {
                    tracing::warn!(field, "Ambiguous reference; clearing FK (skip mode)");
                    Ok(FieldOutcome::Cleared)
                }
                Policy::Fail => Ok(FieldOutcome::AbortImport(format!(
                    "Import aborted: ambiguous reference for field '{field}' \
                     ({} = {})",
                    entry.lookup_field, entry.lookup_value
                ))),
            }
        }
    }
}

fn missing_outcome(
    record_index: usize,
    field: &str,
    entry: &RefEntry,
    opts: &ImportOptions,
    report: &mut ImportReport,
) -> AppResult<FieldOutcome> {
    report.trace(ResolutionTrace {
        record_index,
        field: field.to_string(),
        status: ResolutionStatus::Missing,
        lookup_field: Some(entry.lookup_field.clone()),
        lookup_value: Some(entry.lookup_value.clone()),
        resolved_id: None,
        candidates: vec![],
    });

    match opts.on_missing {
        Policy::Skip => {
            tracing::warn!(field, "Missing reference; clearing FK (skip mode)");
            Ok(FieldOutcome::Cleared)
        }
        Policy::Fail => Ok(FieldOutcome::AbortImport(format!(
            "Import aborted: no {} found with {} = {}",
            entry.resource_type, entry.lookup_field, entry.lookup_value
        ))),
    }
}
