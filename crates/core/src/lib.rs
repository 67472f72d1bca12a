//! Pure engine for the ferry migration proxy.
//!
//! This crate has no async, no I/O, and no HTTP. It provides:
//!
//! - The schemaless record model and its reserved fields.
//! - Foreign-key field classification and lookup-field policy.
//! - Tree flattening/nesting and dependency-ordered (topological) sorting.
//! - The three wire codecs (JSON document, CSV, Mermaid diagram).
//! - Import report and resolution trace types.

pub mod codec;
pub mod error;
pub mod fields;
pub mod lookup;
pub mod record;
pub mod refs;
pub mod report;
pub mod topo;
pub mod tree;
