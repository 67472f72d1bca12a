//! Wire codecs: JSON document, CSV table, and Mermaid diagram.
//!
//! All three share the same capability set: encode a record list to text,
//! decode text back to a flat record list, and report their media type and
//! file extension. A [`Format`] tag selects the codec; the diagram codec has
//! three inner [`Dialect`]s.

pub mod document;
pub mod mermaid;
pub mod tabular;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::lookup::LookupConfig;
use crate::record::Record;

/// Wire format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Csv,
    Mermaid,
}

impl Format {
    /// Parse a format name from a query parameter (case-insensitive).
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            "mermaid" => Ok(Format::Mermaid),
            other => Err(CoreError::UnknownFormat(other.to_string())),
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Csv => "text/csv",
            Format::Mermaid => "text/plain",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Mermaid => "mmd",
        }
    }
}

/// Diagram dialect selector for [`Format::Mermaid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Flowchart,
    Graph,
    Mindmap,
}

impl Dialect {
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        match name.to_ascii_lowercase().as_str() {
            "flowchart" => Ok(Dialect::Flowchart),
            "graph" => Ok(Dialect::Graph),
            "mindmap" => Ok(Dialect::Mindmap),
            other => Err(CoreError::UnknownDialect(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Flowchart => "flowchart",
            Dialect::Graph => "graph",
            Dialect::Mindmap => "mindmap",
        }
    }
}

/// Context an encoder may use: diagram headers record where and when the
/// export happened, and labels follow the lookup policy. The document and
/// tabular codecs ignore all of it.
#[derive(Debug, Clone)]
pub struct ExportMeta {
    /// Collection name at the source (last URL path segment).
    pub resource_type: String,
    /// The source endpoint the records were fetched from.
    pub service_url: String,
    pub exported_at: DateTime<Utc>,
    pub dialect: Dialect,
    pub lookup: Option<LookupConfig>,
}

/// Encode a record list with the selected codec.
pub fn encode(format: Format, records: &[Record], meta: &ExportMeta) -> Result<String, CoreError> {
    match format {
        Format::Json => document::encode(records),
        Format::Csv => tabular::encode(records),
        Format::Mermaid => Ok(mermaid::emit(records, meta)),
    }
}

/// Decode text with the selected codec, normalizing to a flat record list.
pub fn decode(format: Format, text: &str) -> Result<Vec<Record>, CoreError> {
    match format {
        Format::Json => document::decode(text),
        Format::Csv => tabular::decode(text),
        Format::Mermaid => mermaid::parse(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_parse_case_insensitively() {
        assert_eq!(Format::parse("json").unwrap(), Format::Json);
        assert_eq!(Format::parse("CSV").unwrap(), Format::Csv);
        assert_eq!(Format::parse("Mermaid").unwrap(), Format::Mermaid);
        assert!(Format::parse("yaml").is_err());
    }

    #[test]
    fn dialect_names_parse() {
        assert_eq!(Dialect::parse("flowchart").unwrap(), Dialect::Flowchart);
        assert_eq!(Dialect::parse("graph").unwrap(), Dialect::Graph);
        assert_eq!(Dialect::parse("mindmap").unwrap(), Dialect::Mindmap);
        assert!(Dialect::parse("sequence").is_err());
    }

    #[test]
    fn media_types_and_extensions_line_up() {
        assert_eq!(Format::Json.media_type(), "application/json");
        assert_eq!(Format::Json.extension(), "json");
        assert_eq!(Format::Csv.media_type(), "text/csv");
        assert_eq!(Format::Csv.extension(), "csv");
        assert_eq!(Format::Mermaid.media_type(), "text/plain");
        assert_eq!(Format::Mermaid.extension(), "mmd");
    }
}
