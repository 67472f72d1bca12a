//! The Mermaid diagram codec.
//!
//! Three dialects share one record model: every node carries a label plus its
//! source id, and directed edges run from parent to child. Flowchart and
//! graph dialects declare nodes and edges on separate lines; mindmap encodes
//! the hierarchy through indentation.
//!
//! Emitted diagrams start with a theme-init directive, the dialect token, and
//! a metadata comment block. The parser treats the metadata as optional and
//! is lenient about whitespace and node shapes (`[...]`, `(...)`, `{...}`).

use std::collections::HashMap;

use serde_json::Value;

use crate::codec::{Dialect, ExportMeta};
use crate::error::CoreError;
use crate::fields;
use crate::lookup;
use crate::record::{source_id, Record, FIELD_ORIGINAL_ID};

const INIT_DIRECTIVE: &str = "%%{init: {'theme':'base'}}%%";
const LABEL_BREAK: &str = "<br/>";
const MAX_LABEL_LEN: usize = 100;

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

pub fn emit(records: &[Record], meta: &ExportMeta) -> String {
    let parent_field = fields::detect_parent_field(records);

    let mut lines = vec![INIT_DIRECTIVE.to_string()];
    lines.push(match meta.dialect {
        Dialect::Flowchart => "flowchart TD".to_string(),
        Dialect::Graph => "graph TD".to_string(),
        Dialect::Mindmap => "mindmap".to_string(),
    });
    lines.extend(metadata_lines(records, meta, parent_field.is_some()));
    lines.push(String::new());

    match meta.dialect {
        Dialect::Flowchart => emit_node_edge(records, meta, parent_field, true, &mut lines),
        Dialect::Graph => emit_node_edge(records, meta, parent_field, false, &mut lines),
        Dialect::Mindmap => emit_mindmap(records, meta, parent_field, &mut lines),
    }

    lines.join("\n")
}

fn metadata_lines(records: &[Record], meta: &ExportMeta, is_tree: bool) -> Vec<String> {
    vec![
        "%% Metadata".to_string(),
        format!("%% export_date: {}", meta.exported_at.to_rfc3339()),
        format!("%% resource_type: {}", meta.resource_type),
        format!("%% total_nodes: {}", records.len()),
        format!("%% service_url: {}", meta.service_url),
        format!("%% diagram_type: {}", meta.dialect.as_str()),
        format!("%% is_tree: {is_tree}"),
    ]
}

fn emit_node_edge(
    records: &[Record],
    meta: &ExportMeta,
    parent_field: Option<&str>,
    with_clicks: bool,
    lines: &mut Vec<String>,
) {
    // Node declarations.
    for (idx, record) in records.iter().enumerate() {
        let id = node_source_id(record, idx);
        let mut label = format!(
            "{}{LABEL_BREAK}{FIELD_ORIGINAL_ID}: {id}",
            sanitize_label(&lookup::display_label(
                record,
                &meta.resource_type,
                meta.lookup.as_ref()
            ))
        );
        if with_clicks {
            // Flowchart nodes also surface a status line when present.
            if let Some(status) = record.get("status").and_then(Value::as_str) {
                label.push_str(&format!("{LABEL_BREAK}status: {}", sanitize_label(status)));
            }
        }
        lines.push(format!("    {}[\"{label}\"]", safe_id(&id)));
    }
    lines.push(String::new());

    // Edges: parent --> child for trees, a sequential chain otherwise.
    match parent_field {
        Some(field) => {
            for (idx, record) in records.iter().enumerate() {
                if let Some(parent) = record.get(field).and_then(Value::as_str) {
                    let child = node_source_id(record, idx);
                    lines.push(format!("    {} --> {}", safe_id(parent), safe_id(&child)));
                }
            }
        }
        None => {
            for (idx, window) in records.windows(2).enumerate() {
                let from = node_source_id(&window[0], idx);
                let to = node_source_id(&window[1], idx + 1);
                lines.push(format!("    {} --> {}", safe_id(&from), safe_id(&to)));
            }
        }
    }

    if with_clicks {
        lines.push(String::new());
        for (idx, record) in records.iter().enumerate() {
            let id = node_source_id(record, idx);
            lines.push(format!(
                "    click {} \"{}/{id}\"",
                safe_id(&id),
                meta.service_url
            ));
        }
    }
}

fn emit_mindmap(
    records: &[Record],
    meta: &ExportMeta,
    parent_field: Option<&str>,
    lines: &mut Vec<String>,
) {
    let ids: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(idx, r)| node_source_id(r, idx))
        .collect();

    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        match parent_field.and_then(|f| record.get(f)).and_then(Value::as_str) {
            Some(parent) if ids.iter().any(|id| id == parent) => {
                children.entry(parent).or_default().push(idx)
            }
            _ => roots.push(idx),
        }
    }

    let mut emitted = vec![false; records.len()];
    for root in roots {
        emit_mindmap_node(root, 0, records, &ids, &children, &mut emitted, meta, lines);
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_mindmap_node(
    idx: usize,
    depth: usize,
    records: &[Record],
    ids: &[String],
    children: &HashMap<&str, Vec<usize>>,
    emitted: &mut [bool],
    meta: &ExportMeta,
    lines: &mut Vec<String>,
) {
    if emitted[idx] {
        return;
    }
    emitted[idx] = true;

    let id = &ids[idx];
    let label = format!(
        "{}{LABEL_BREAK}{FIELD_ORIGINAL_ID}: {id}",
        sanitize_label(&lookup::display_label(
            &records[idx],
            &meta.resource_type,
            meta.lookup.as_ref()
        ))
    );
    lines.push(format!("{}{}({label})", "  ".repeat(depth), safe_id(id)));

    if let Some(child_indices) = children.get(id.as_str()) {
        for &child in child_indices {
            emit_mindmap_node(child, depth + 1, records, ids, children, emitted, meta, lines);
        }
    }
}

/// Node identifier used in diagram syntax: the source id with everything but
/// ASCII alphanumerics stripped.
fn safe_id(id: &str) -> String {
    let stripped: String = id.chars().filter(char::is_ascii_alphanumeric).collect();
    if stripped.is_empty() {
        "n".to_string()
    } else {
        stripped
    }
}

fn node_source_id(record: &Record, idx: usize) -> String {
    source_id(record)
        .map(str::to_string)
        .unwrap_or_else(|| format!("n{idx}"))
}

fn sanitize_label(text: &str) -> String {
    let cleaned: String = text
        .replace('"', "'")
        .replace('\n', " ")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    cleaned.chars().take(MAX_LABEL_LEN).collect()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

pub fn parse(text: &str) -> Result<Vec<Record>, CoreError> {
    let dialect = detect_dialect(text).ok_or(CoreError::UndetectedDialect)?;
    let metadata = parse_metadata(text);
    // Without metadata, edges are taken at face value as parent links; an
    // explicit `is_tree: false` marks them as a decorative chain instead.
    let apply_edges = metadata.get("is_tree").map(String::as_str) != Some("false");

    match dialect {
        Dialect::Flowchart | Dialect::Graph => Ok(parse_node_edge(text, apply_edges)),
        Dialect::Mindmap => Ok(parse_mindmap(text)),
    }
}

fn detect_dialect(text: &str) -> Option<Dialect> {
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("flowchart") {
            return Some(Dialect::Flowchart);
        }
        if line.starts_with("graph") {
            return Some(Dialect::Graph);
        }
        if line == "mindmap" {
            return Some(Dialect::Mindmap);
        }
    }
    None
}

fn parse_metadata(text: &str) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        // Skip directives like %%{init: ...}%%; they are not metadata.
        if !line.starts_with("%%") || line.starts_with("%%{") {
            continue;
        }
        let content = line.trim_start_matches('%').trim();
        if let Some((key, value)) = content.split_once(':') {
            metadata.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    metadata
}

fn parse_node_edge(text: &str, apply_edges: bool) -> Vec<Record> {
    let mut order: Vec<String> = Vec::new();
    let mut nodes: HashMap<String, Record> = HashMap::new();
    let mut edges: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("%%")
            || line.starts_with("flowchart")
            || line.starts_with("graph")
            || line.starts_with("click")
        {
            continue;
        }

        if let Some((parent, child)) = parse_edge(line) {
            edges.push((parent, child));
            continue;
        }

        if let Some((sid, inner)) = parse_node_shape(line) {
            let record = record_from_label(&sid, &inner);
            if !nodes.contains_key(&sid) {
                order.push(sid.clone());
            }
            nodes.insert(sid, record);
        }
    }

    if apply_edges {
        for (parent_sid, child_sid) in edges {
            let Some(parent_oid) = nodes
                .get(&parent_sid)
                .and_then(|r| r.get(FIELD_ORIGINAL_ID))
                .cloned()
            else {
                continue;
            };
            if let Some(child) = nodes.get_mut(&child_sid) {
                child.insert("parent_id".to_string(), parent_oid);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|sid| nodes.remove(&sid))
        .collect()
}

fn parse_mindmap(text: &str) -> Vec<Record> {
    let mut records: Vec<Record> = Vec::new();
    // (depth, _original_id) of the most recent node at each level.
    let mut stack: Vec<(usize, Value)> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("%%") || trimmed == "mindmap" {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        let depth = indent / 2;

        let (sid, inner) = parse_node_shape(trimmed)
            .unwrap_or_else(|| (safe_id(trimmed), trimmed.to_string()));
        let mut record = record_from_label(&sid, &inner);

        while stack.last().is_some_and(|(d, _)| *d >= depth) {
            stack.pop();
        }
        if let Some((_, parent_oid)) = stack.last() {
            record.insert("parent_id".to_string(), parent_oid.clone());
        }

        let oid = record
            .get(FIELD_ORIGINAL_ID)
            .cloned()
            .unwrap_or(Value::String(sid));
        stack.push((depth, oid));
        records.push(record);
    }

    records
}

/// Split an edge line `a --> b` (or the undirected `a --- b`) into its
/// endpoint identifiers. Both sides must be bare identifiers; anything else
/// is a node declaration whose label merely contains dashes.
fn parse_edge(line: &str) -> Option<(String, String)> {
    let (left, right) = line
        .split_once("-->")
        .or_else(|| line.split_once("---"))?;
    let left = left.trim();
    let right = right.trim();
    if is_identifier(left) && is_identifier(right) {
        Some((left.to_string(), right.to_string()))
    } else {
        None
    }
}

fn is_identifier(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a node declaration into its identifier and label, accepting the
/// shapes `id["label"]`, `id[label]`, `id((label))`, `id(label)`, and
/// `id{label}`.
fn parse_node_shape(line: &str) -> Option<(String, String)> {
    let open = line.find(|c: char| ['[', '(', '{'].contains(&c))?;
    let sid = &line[..open];
    if !is_identifier(sid) {
        return None;
    }

    let rest = &line[open..];
    let inner = if let Some(inner) = strip_wrapped(rest, "((", "))") {
        inner
    } else if let Some(inner) = strip_wrapped(rest, "[", "]") {
        inner
    } else if let Some(inner) = strip_wrapped(rest, "(", ")") {
        inner
    } else {
        strip_wrapped(rest, "{", "}")?
    };

    let inner = inner.trim().trim_matches('"').to_string();
    Some((sid.to_string(), inner))
}

fn strip_wrapped<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    text.strip_prefix(open)?.strip_suffix(close)
}

/// Build a record from a node label. The first `<br/>`-delimited segment is
/// the name; later `key: value` segments become fields, with `_original_id`
/// recognised specially. Nodes without an id segment fall back to the node
/// identifier.
fn record_from_label(sid: &str, label: &str) -> Record {
    let mut segments = label.split(LABEL_BREAK);
    let name = segments.next().unwrap_or("Unknown").trim();

    let mut record = Record::new();
    record.insert(
        FIELD_ORIGINAL_ID.to_string(),
        Value::String(sid.to_string()),
    );
    record.insert("name".to_string(), Value::String(name.to_string()));
    record.insert("parent_id".to_string(), Value::Null);

    for segment in segments {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key == FIELD_ORIGINAL_ID {
            record.insert(
                FIELD_ORIGINAL_ID.to_string(),
                Value::String(value.to_string()),
            );
        } else if !key.is_empty() {
            record.insert(key.to_string(), Value::String(value.to_string()));
        }
    }

    record
}
