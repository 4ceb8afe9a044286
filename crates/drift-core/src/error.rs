//! Error types for drift-core

use thiserror::Error;

/// Result type alias using drift-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in drift-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local persistence write failed; always surfaced to the caller
    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Push/upsert to the remote store failed
    #[error("Remote sync failed: {0}")]
    RemoteSync(String),

    /// Delete against the remote store failed
    #[error("Remote delete failed: {0}")]
    RemoteDelete(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
