//! Conversion between flat record lists (with parent pointers) and nested
//! forests (with `children` arrays).

use serde_json::Value;

use crate::record::{source_id, Record, FIELD_CHILDREN};
use crate::topo;

/// Convert a nested forest into a flat list by depth-first pre-order
/// traversal. Each emitted record loses its `children` field and gains the
/// parent's source id under `parent_field` (roots get null).
pub fn flatten(forest: &[Record], parent_field: &str) -> Vec<Record> {
    let mut flat = Vec::new();
    for root in forest {
        walk(root, None, parent_field, &mut flat);
    }
    flat
}

fn walk(node: &Record, parent_id: Option<&str>, parent_field: &str, out: &mut Vec<Record>) {
    let mut copy: Record = node
        .iter()
        .filter(|(k, _)| k.as_str() != FIELD_CHILDREN)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    copy.insert(
        parent_field.to_string(),
        match parent_id {
            Some(id) => Value::String(id.to_string()),
            None => Value::Null,
        },
    );

    let node_id = source_id(node).map(str::to_string);
    out.push(copy);

    if let Some(Value::Array(children)) = node.get(FIELD_CHILDREN) {
        for child in children.iter().filter_map(Value::as_object) {
            walk(child, node_id.as_deref(), parent_field, out);
        }
    }
}

/// Convert a flat list into a nested forest. Records gain a `children` array;
/// roots are records whose parent is null or references an id not present in
/// the list. Sibling order follows input order.
///
/// Returns `None` when the parent relation contains a cycle; callers keep the
/// flat shape in that case.
pub fn nest(records: &[Record], parent_field: &str) -> Option<Vec<Record>> {
    if topo::find_cycle(records, parent_field).is_some() {
        return None;
    }

    let ids: Vec<Option<String>> = records
        .iter()
        .map(|r| source_id(r).map(str::to_string))
        .collect();

    let index_of = |id: &str| -> Option<usize> {
        ids.iter()
            .position(|candidate| candidate.as_deref() == Some(id))
    };

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut roots: Vec<usize> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let parent_idx = record
            .get(parent_field)
            .and_then(Value::as_str)
            .and_then(index_of);
        match parent_idx {
            Some(parent) => children_of[parent].push(idx),
            None => roots.push(idx),
        }
    }

    Some(
        roots
            .into_iter()
            .map(|idx| build(idx, records, &children_of))
            .collect(),
    )
}

fn build(idx: usize, records: &[Record], children_of: &[Vec<usize>]) -> Record {
    let mut node = records[idx].clone();
    let children: Vec<Value> = children_of[idx]
        .iter()
        .map(|child| Value::Object(build(*child, records, children_of)))
        .collect();
    node.insert(FIELD_CHILDREN.to_string(), Value::Array(children));
    node
}
