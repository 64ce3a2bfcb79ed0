//! Storage error types

use thiserror::Error;

/// Errors raised by a storage backend
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Backend refused the write because it is full
    #[error("quota exceeded writing '{key}': {needed} bytes > {limit} bytes")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    /// Any other backend failure (browser security errors, detached storage, ...)
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
