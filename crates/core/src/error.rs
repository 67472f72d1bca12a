#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The request body could not be decoded by the selected codec.
    /// Line/column are populated when the underlying parser reports them.
    #[error("Decode error: {message}")]
    Decode {
        message: String,
        line: Option<u64>,
        column: Option<u64>,
    },

    /// The decoded body was syntactically valid but not a list of records.
    #[error("Body must contain an array of records")]
    NotAnArray,

    /// An unrecognised wire format name.
    #[error("Unsupported format: {0}. Allowed values: json, csv, mermaid")]
    UnknownFormat(String),

    /// An unrecognised diagram dialect name.
    #[error("Invalid diagram type: {0}. Must be one of: flowchart, graph, mindmap")]
    UnknownDialect(String),

    /// A diagram body whose dialect could not be detected from its header.
    #[error("Could not detect diagram dialect")]
    UndetectedDialect,
}

impl CoreError {
    /// Build a [`CoreError::Decode`] from a serde_json parse failure,
    /// carrying the line/column it reports.
    pub fn from_json(err: &serde_json::Error) -> Self {
        CoreError::Decode {
            message: err.to_string(),
            line: Some(err.line() as u64),
            column: Some(err.column() as u64),
        }
    }

    /// Build a [`CoreError::Decode`] from a csv parse failure, carrying the
    /// line it reports when a position is available.
    pub fn from_csv(err: &csv::Error) -> Self {
        let line = match err.kind() {
            csv::ErrorKind::Utf8 { pos, .. } => pos.as_ref().map(|p| p.line()),
            csv::ErrorKind::UnequalLengths { pos, .. } => pos.as_ref().map(|p| p.line()),
            _ => err.position().map(|p| p.line()),
        };
        CoreError::Decode {
            message: err.to_string(),
            line,
            column: None,
        }
    }
}
