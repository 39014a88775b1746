//! Error types for optihit-core.

use thiserror::Error;

/// Result type alias for optihit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for optihit operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Efficiency curve failed validation.
    #[error("invalid efficiency curve: {0}")]
    InvalidCurve(String),

    /// Column definition attempted after the schema was locked.
    #[error("output schema is locked; cannot define column `{0}`")]
    SchemaLocked(String),

    /// Two columns share the same name.
    #[error("duplicate output column `{0}`")]
    DuplicateColumn(String),

    /// Column handle or slot kind does not match the schema.
    #[error("column {handle} is not a {expected} column")]
    ColumnKindMismatch {
        handle: usize,
        expected: &'static str,
    },

    /// A row was committed before the schema was defined.
    #[error("event accumulator has not been initialized")]
    NotInitialized,

    /// Output schema set up twice.
    #[error("output schema already initialized")]
    AlreadyInitialized,

    /// Event-end requested with no event in progress.
    #[error("no event in progress")]
    NoOpenEvent,

    /// Detector summary lookup by name failed.
    #[error("unknown detector `{0}`")]
    UnknownDetector(String),

    /// Run metadata key written twice to the same sink.
    #[error("metadata key `{0}` already written")]
    DuplicateMetadata(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Output sink failure.
    #[error("output sink error: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
