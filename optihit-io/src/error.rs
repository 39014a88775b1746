//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Row or column binding does not match the sink layout.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Run metadata key written twice.
    #[error("metadata key `{0}` already written")]
    DuplicateMetadata(String),

    /// Sink used after `close`.
    #[error("sink is closed")]
    Closed,

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] optihit_core::Error),
}

impl From<Error> for optihit_core::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::CoreError(inner) => inner,
            Error::DuplicateMetadata(key) => optihit_core::Error::DuplicateMetadata(key),
            other => optihit_core::Error::Sink(Box::new(other)),
        }
    }
}
