//! In-memory blob store.

use crate::error::{StoreError, StoreResult};
use crate::store::{BlobStore, VersionToken};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Blob {
    bytes: Vec<u8>,
    version: VersionToken,
}

/// Blob store held in process memory.
///
/// Every write issues a fresh random version token, so any successful
/// write invalidates all previously issued tokens for that blob.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Blob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all stored blobs, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Blob>>> {
        self.blobs
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn fresh_version() -> VersionToken {
        VersionToken::new(Uuid::new_v4().to_string())
    }
}

impl BlobStore for MemoryBlobStore {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn read(&self, name: &str, timeout: Option<Duration>) -> StoreResult<Vec<u8>> {
        self.read_with_metadata(name, timeout).map(|(bytes, _)| bytes)
    }

    fn read_with_metadata(&self, name: &str, _timeout: Option<Duration>) -> StoreResult<(Vec<u8>, VersionToken)> {
        let blobs = self.lock()?;
        blobs
            .get(name)
            .map(|blob| (blob.bytes.clone(), blob.version.clone()))
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn write_if_match(&self, name: &str, bytes: &[u8], token: &VersionToken) -> StoreResult<VersionToken> {
        let mut blobs = self.lock()?;
        match blobs.get_mut(name) {
            Some(blob) if blob.version == *token => {
                blob.bytes = bytes.to_vec();
                blob.version = Self::fresh_version();
                debug!("Conditional write to {} ({} bytes)", name, bytes.len());
                Ok(blob.version.clone())
            }
            _ => Err(StoreError::ConditionFailed(name.to_string())),
        }
    }

    fn write(&self, name: &str, bytes: &[u8]) -> StoreResult<VersionToken> {
        let version = Self::fresh_version();
        self.lock()?.insert(
            name.to_string(),
            Blob {
                bytes: bytes.to_vec(),
                version: version.clone(),
            },
        );
        debug!("Wrote {} ({} bytes)", name, bytes.len());
        Ok(version)
    }

    fn delete(&self, name: &str) -> StoreResult<bool> {
        let existed = self.lock()?.remove(name).is_some();
        debug!("Deleted {} (existed: {})", name, existed);
        Ok(existed)
    }
}
