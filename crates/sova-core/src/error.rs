//! Pipeline error handling
//!
//! Errors surfaced by format detection, import and export. Storage
//! failures are wrapped unchanged.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while importing or exporting a dataset
#[derive(Error, Debug)]
pub enum Error {
    /// An input file does not exist
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// An input file is malformed
    #[error("Invalid file '{path}'{}: {details}", line_suffix(.line))]
    InvalidFile {
        path: PathBuf,
        line: Option<usize>,
        details: String,
    },

    /// No format strategy is registered for the extension
    #[error("Unsupported file format: .{extension}")]
    UnsupportedFormat { extension: String },

    /// Reading or writing a dataset file failed
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The store rejected an operation
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Error {
    /// Invalid file without a line position
    pub fn invalid(path: &Path, details: impl Into<String>) -> Self {
        Error::InvalidFile {
            path: path.to_path_buf(),
            line: None,
            details: details.into(),
        }
    }

    /// Invalid file at a 1-based line number
    pub fn invalid_at(path: &Path, line: usize, details: impl Into<String>) -> Self {
        Error::InvalidFile {
            path: path.to_path_buf(),
            line: Some(line),
            details: details.into(),
        }
    }

    /// Classify an I/O error on `path`
    pub fn from_io(error: io::Error, path: &Path) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Storage(e) => e.recovery_suggestion(),
            Error::UnsupportedFormat { .. } => {
                Some("Run `sova formats` to list the supported file extensions.")
            }
            _ => None,
        }
    }
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" at line {}", l)).unwrap_or_default()
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
