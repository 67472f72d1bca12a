//! Dependency ordering for parent/child record batches.
//!
//! Kahn's algorithm over the parent relation, keyed by each record's source
//! id. The order is stable: roots in input order, then children as their
//! parents complete, siblings in input order.

use serde_json::Value;

use crate::record::{source_id, Record};

/// Ids of the records left unordered because their parent relation is
/// circular.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CycleReport {
    pub ids: Vec<String>,
}

/// Order records so parents precede children.
///
/// With `detect_cycles`, returns the acyclic prefix in dependency order
/// followed by the cyclic remainder in input order, plus a report naming the
/// cyclic ids. Without it, records come back in input order untouched.
pub fn topo_sort(
    records: Vec<Record>,
    parent_field: &str,
    detect_cycles: bool,
) -> (Vec<Record>, Option<CycleReport>) {
    if !detect_cycles || records.is_empty() {
        return (records, None);
    }

    let ids: Vec<Option<String>> = records
        .iter()
        .map(|r| source_id(r).map(str::to_string))
        .collect();
    let index_of = |id: &str| -> Option<usize> {
        ids.iter()
            .position(|candidate| candidate.as_deref() == Some(id))
    };

    let mut in_degree = vec![0usize; records.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];

    for (idx, record) in records.iter().enumerate() {
        let parent = record
            .get(parent_field)
            .and_then(Value::as_str)
            .and_then(index_of);
        if let Some(parent_idx) = parent {
            if parent_idx != idx {
                in_degree[idx] += 1;
                children[parent_idx].push(idx);
            } else {
                // A record that is its own parent is a one-node cycle.
                in_degree[idx] += 1;
            }
        }
    }

    let mut queue: std::collections::VecDeque<usize> = (0..records.len())
        .filter(|idx| in_degree[*idx] == 0)
        .collect();
    let mut order: Vec<usize> = Vec::with_capacity(records.len());

    while let Some(idx) = queue.pop_front() {
        order.push(idx);
        for &child in &children[idx] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    let mut report = None;
    if order.len() < records.len() {
        // Whatever kept a non-zero in-degree is on (or below) a cycle.
        let remainder: Vec<usize> = (0..records.len())
            .filter(|idx| in_degree[*idx] > 0)
            .collect();
        report = Some(CycleReport {
            ids: remainder
                .iter()
                .filter_map(|idx| ids[*idx].clone())
                .collect(),
        });
        order.extend(remainder);
    }

    let mut slots: Vec<Option<Record>> = records.into_iter().map(Some).collect();
    let ordered = order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect();
    (ordered, report)
}

/// Find one cycle in the parent relation, returned as the ids along it.
/// Returns `None` for acyclic input.
pub fn find_cycle(records: &[Record], parent_field: &str) -> Option<Vec<String>> {
    let mut parent_of = std::collections::HashMap::new();
    for record in records {
        let Some(id) = source_id(record) else { continue };
        if let Some(parent) = record.get(parent_field).and_then(Value::as_str) {
            parent_of.insert(id.to_string(), parent.to_string());
        }
    }

    let mut visited: std::collections::HashSet<String> = std::collections::HashSet::new();

    for start in parent_of.keys() {
        if visited.contains(start) {
            continue;
        }

        let mut path: Vec<String> = Vec::new();
        let mut current = Some(start.clone());

        while let Some(id) = current {
            if visited.contains(&id) {
                break;
            }
            if let Some(pos) = path.iter().position(|p| *p == id) {
                return Some(path[pos..].to_vec());
            }
            path.push(id.clone());
            current = parent_of.get(&id).cloned();
        }

        visited.extend(path);
    }

    None
}
