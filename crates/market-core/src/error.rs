//! Market error types

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur during market operations
#[derive(Debug, Error)]
pub enum MarketError {
    /// Storage backend rejected a read or write
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Snapshot could not be encoded or decoded as JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted snapshot is valid JSON but not an object
    #[error("invalid snapshot for market '{market}': expected a JSON object, found {found}")]
    InvalidSnapshot { market: String, found: String },

    /// Mutation attempted on a destroyed market
    #[error("market '{0}' has been destroyed")]
    Destroyed(String),

    /// Element listener registration failed
    #[error("element error: {0}")]
    Element(String),

    /// A queued task failed while the queue was draining
    #[error("task for product '{product}' failed: {source}")]
    Task {
        product: String,
        #[source]
        source: TaskError,
    },
}

/// Result type for market operations
pub type MarketResult<T> = Result<T, MarketError>;

/// Failure reported by a queued task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TaskError(pub String);

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        TaskError(message.to_string())
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        TaskError(message)
    }
}
