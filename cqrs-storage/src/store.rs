//! Blob store abstraction.
//!
//! Defines the interface the record and entity stores need from a remote
//! blob-style store: named byte blobs, an opaque version token per blob and
//! a conditional write against that token.

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Opaque version of a stored blob (ETag, row version, write generation).
///
/// A token is only meaningful for the store that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named blob storage with conditional writes.
///
/// Names are `/`-separated paths; the first segment is the container.
pub trait BlobStore: Send + Sync {
    /// Returns the name of the storage backend.
    fn provider_name(&self) -> &'static str;

    /// Reads a blob. `timeout` bounds the read when the backend supports it.
    fn read(&self, name: &str, timeout: Option<Duration>) -> StoreResult<Vec<u8>>;

    /// Reads a blob together with its current version token. `timeout`
    /// bounds the read as in [`read`](Self::read).
    fn read_with_metadata(&self, name: &str, timeout: Option<Duration>) -> StoreResult<(Vec<u8>, VersionToken)>;

    /// Replaces a blob only if its version still equals `token`.
    ///
    /// Fails with `ConditionFailed` if the blob changed or disappeared.
    fn write_if_match(&self, name: &str, bytes: &[u8], token: &VersionToken) -> StoreResult<VersionToken>;

    /// Creates or replaces a blob unconditionally.
    fn write(&self, name: &str, bytes: &[u8]) -> StoreResult<VersionToken>;

    /// Deletes a blob. Returns whether it existed.
    fn delete(&self, name: &str) -> StoreResult<bool>;
}

impl<S: BlobStore + ?Sized> BlobStore for Arc<S> {
    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }

    fn read(&self, name: &str, timeout: Option<Duration>) -> StoreResult<Vec<u8>> {
        (**self).read(name, timeout)
    }

    fn read_with_metadata(&self, name: &str, timeout: Option<Duration>) -> StoreResult<(Vec<u8>, VersionToken)> {
        (**self).read_with_metadata(name, timeout)
    }

    fn write_if_match(&self, name: &str, bytes: &[u8], token: &VersionToken) -> StoreResult<VersionToken> {
        (**self).write_if_match(name, bytes, token)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> StoreResult<VersionToken> {
        (**self).write(name, bytes)
    }

    fn delete(&self, name: &str) -> StoreResult<bool> {
        (**self).delete(name)
    }
}
