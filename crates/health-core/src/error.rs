use thiserror::Error;

/// All errors produced by the health pipeline.
#[derive(Error, Debug)]
pub enum HealthError {
    /// The telemetry resource could not be retrieved.
    #[error("Failed to fetch {locator}: {source}")]
    Fetch {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// The locator uses a scheme the fetcher cannot serve.
    #[error("Unsupported resource locator: {0}")]
    UnsupportedLocator(String),

    /// The tabular text is malformed.
    #[error("Failed to parse CSV{}: {message}", at_line(.line))]
    Parse { line: Option<u64>, message: String },

    /// Scoring was requested against an empty record set.
    #[error("Cannot score against an empty record set")]
    EmptyPopulation,

    /// A required column is absent from the header, or a required cell is blank.
    #[error("Missing field `{field}`{}", at_line(.line))]
    MissingField { field: String, line: Option<u64> },

    /// A cell could not be converted to the type its column requires.
    #[error("Invalid value {value:?} for field `{field}` at line {line}")]
    InvalidField {
        field: String,
        line: u64,
        value: String,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be parsed or produced.
    #[error("Failed to process JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a locator.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HealthError {
    /// Shorthand for a [`HealthError::Parse`] tied to a source line.
    pub fn parse_at(line: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            line: Some(line),
            message: message.into(),
        }
    }

    /// Shorthand for a [`HealthError::MissingField`] tied to a source line.
    pub fn missing_at(field: impl Into<String>, line: u64) -> Self {
        Self::MissingField {
            field: field.into(),
            line: Some(line),
        }
    }
}

fn at_line(line: &Option<u64>) -> String {
    line.map(|l| format!(" at line {l}")).unwrap_or_default()
}

/// Convenience alias used throughout the health crates.
pub type Result<T> = std::result::Result<T, HealthError>;
