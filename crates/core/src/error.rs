//! Error types for the tutorgraph domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all tutorgraph operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Knowledge / submission store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Embedding backend errors ---
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Corpus export errors ---
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store cannot be reached at all. This is the one condition the
    /// retrieval engine never swallows.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflicting record: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Whether this failure must propagate instead of degrading retrieval.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding model is not trained: {0}")]
    NotTrained(String),

    #[error("Failed to start embedding worker: {0}")]
    Spawn(String),

    #[error("Embedding worker exited with status {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    #[error("Malformed worker output: {0}")]
    MalformedOutput(String),

    #[error("Embedding worker rejected the request: {0}")]
    Rejected(String),

    #[error("Embedding worker timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Worker I/O failed: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Corpus export failed: {0}")]
    Store(#[from] StoreError),

    #[error("Trainer failed: {0}")]
    Trainer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_displays_correctly() {
        let err = Error::Store(StoreError::Unavailable("connection refused".into()));
        assert!(err.to_string().contains("unavailable"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn only_unavailable_is_fatal() {
        assert!(StoreError::Unavailable("down".into()).is_fatal());
        assert!(!StoreError::QueryFailed("bad sql".into()).is_fatal());
        assert!(!StoreError::NotFound("x".into()).is_fatal());
    }

    #[test]
    fn embedding_timeout_displays_duration() {
        let err = Error::Embedding(EmbeddingError::Timeout { timeout_ms: 5000 });
        assert!(err.to_string().contains("5000ms"));
    }
}
