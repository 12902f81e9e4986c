//! Error types for the lightweight_core library.

use std::io;
use uuid::Uuid;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lightweight_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Insert of an identity that is already stored
    #[error("Duplicate identity: {0}")]
    DuplicateIdentity(Uuid),

    /// Lookup of an identity that is not (or no longer) stored
    #[error("Not found: {0}")]
    NotFound(Uuid),

    /// Commit failed; the store kept its previous state
    #[error("Persist failed: {0}")]
    PersistFailed(String),

    /// Export file could not be written; no partial file is left behind
    #[error("Export failed: {0}")]
    ExportIo(String),

    /// A record violates a model invariant
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error names a record that has already gone away.
    ///
    /// Cascade delete can remove a target before the caller gets to it, so
    /// callers usually treat this as a no-op.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
