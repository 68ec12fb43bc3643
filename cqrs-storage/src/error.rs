//! Error types for the storage layer.

use thiserror::Error;

/// Result type for blob store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`BlobStore`](crate::BlobStore).
///
/// Stores must keep `NotFound` distinct from every other failure; the
/// record and entity stores recover from it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No blob under this name.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Conditional write rejected: the blob changed since it was read.
    #[error("condition failed for blob: {0}")]
    ConditionFailed(String),

    /// Read did not complete within the timeout.
    #[error("read timed out: {0}")]
    Timeout(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for record and entity store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in record and entity store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The record was modified between read and write. Callers may retry.
    #[error("record was modified concurrently: '{contract}'; id: '{identity}'")]
    ConcurrencyConflict { contract: String, identity: String },

    /// The record type has no contract name.
    #[error("type '{0}' has no contract name")]
    ContractNameMissing(String),

    /// Error from the underlying blob store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from the payload serializer.
    #[error("payload error: {0}")]
    Payload(#[from] cqrs_types::Error),
}

impl StorageError {
    /// True for [`StorageError::ConcurrencyConflict`].
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
