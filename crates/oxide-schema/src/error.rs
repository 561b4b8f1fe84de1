//! Error types for the SQLite schema driver.

use oxide_schema_core::SchemaError;

/// Errors returned by the driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A schema precondition or mutation failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Database error outside a schema mutation (connecting, reading the
    /// catalog on the read path, seeding rows).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading spec files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// The schema error kind, if this is one.
    #[must_use]
    pub fn schema(&self) -> Option<&SchemaError> {
        match self {
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, Error>;
