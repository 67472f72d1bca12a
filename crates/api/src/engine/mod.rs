//! The export and import pipelines, plus the reference enricher they share.

pub mod enrich;
pub mod export;
pub mod import;
