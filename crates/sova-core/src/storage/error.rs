//! Storage error handling
//!
//! Typed errors for the SQLite-backed store, with descriptive messages
//! and recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The linked SQLite library cannot serve this schema
    #[error("SQLite {found} is unavailable for this store (need at least {required})")]
    DriverUnavailable { found: String, required: String },

    /// Could not open or create the database file
    #[error("Failed to open database '{path}': {source}")]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Connection tuning was rejected by the engine
    #[error("Failed to configure database connection: {0}")]
    ConfigFailed(#[source] rusqlite::Error),

    /// Store was written by a different layout version
    #[error("Incompatible store version {found} (expected {expected})")]
    IncompatibleVersion { found: i32, expected: i32 },

    /// A query against the store failed
    #[error("Failed to read from database: {0}")]
    ReadFailed(#[source] rusqlite::Error),

    /// A write or transaction against the store failed
    #[error("Failed to write to database: {0}")]
    WriteFailed(#[source] rusqlite::Error),
}

impl StorageError {
    /// Check if this error is recoverable by user action
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::ConnectionFailed { .. } | StorageError::IncompatibleVersion { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::ConnectionFailed { .. } => {
                Some("Check that the database directory exists and you have write permissions.")
            }
            StorageError::IncompatibleVersion { .. } => {
                Some("The store was created by another version. Point --db at a new file and re-import the dataset.")
            }
            StorageError::DriverUnavailable { .. } => {
                Some("Rebuild with the bundled SQLite library enabled.")
            }
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
