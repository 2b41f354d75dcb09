//! Centralized error types for AssetRAG.

use thiserror::Error;

/// Main error type for AssetRAG operations.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Endpoint not found for {relationship}: {source_id} -> {target_id}")]
    ReferentialMiss {
        relationship: String,
        source_id: String,
        target_id: String,
    },

    #[error("Source '{path}' is missing required columns: {}", columns.join(", "))]
    MissingColumns { path: String, columns: Vec<String> },

    #[error("Graph store unreachable: {0}")]
    Connection(String),

    #[error("Statement failed: {0}")]
    Statement(String),

    #[error("Unsafe value for slot {slot}: {value:?}")]
    UnsafeSlotValue { slot: String, value: String },

    #[error("Source error in '{path}': {message}")]
    Source { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for AssetRAG operations.
pub type RagResult<T> = Result<T, RagError>;

impl RagError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a source error for a file path.
    pub fn source(path: impl Into<String>, msg: impl ToString) -> Self {
        Self::Source {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    /// Whether this error must abort the current stage.
    ///
    /// Only a lost store connection is fatal; everything else is scoped to a
    /// row, a file or a single compile request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
