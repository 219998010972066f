//! Error type shared by the traceability engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while allocating IDs, parsing documents or writing reports
#[derive(Debug, Error)]
pub enum SpecTestError {
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Identifier store {path} is corrupt: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("Timeout waiting for lock on identifier store {0} - another process may be allocating")]
    StoreLocked(PathBuf),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid input in {path}: {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl SpecTestError {
    /// Builds a `StoreCorrupt` error for the given store path
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SpecTestError::StoreCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SpecTestError>;
