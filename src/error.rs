//! Error types for counsel-memory

use thiserror::Error;

/// Result type alias for counsel-memory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in counsel-memory
#[derive(Error, Debug)]
pub enum Error {
    #[error("dimension mismatch: collection expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn embedding_unavailable(msg: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound(name.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}
