//! Error types for the document store.

use crate::path::PathError;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Any failure surfaced by SQLite (I/O, constraint violation, ...).
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A stored row could not be decoded as an envelope.
    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Value at {key}{} is not an array", .path.as_deref().map(|p| format!(" (path {p})")).unwrap_or_default())]
    NotAnArray { key: String, path: Option<String> },

    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("Cannot write path {path}: {reason}")]
    PathConflict { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
