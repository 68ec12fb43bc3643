//! Optimistic-concurrency record ("view") store.
//!
//! A record of type `T` with identity `id` lives in blob
//! `lowercase("{contract}-{id}.view")` inside the configured container.
//! `patch` is a read-modify-write guarded by the version token returned
//! with the read; if another writer got there first the patch fails with
//! [`StorageError::ConcurrencyConflict`] and is not retried.

use crate::error::{StorageError, StorageResult, StoreError};
use crate::store::BlobStore;
use cqrs_types::{MappedType, MessageSerializer, Payload};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewStorageConfig {
    /// Container all records are written to.
    pub container: String,
    /// Bound on the reads done by `load` and `patch`. Reads are never retried.
    pub read_timeout: Duration,
}

impl Default for ViewStorageConfig {
    fn default() -> Self {
        Self {
            container: "views".to_string(),
            read_timeout: Duration::from_secs(3),
        }
    }
}

/// Keyed, versioned record store over a [`BlobStore`].
pub struct ViewStorage<S, M> {
    store: S,
    serializer: M,
    config: ViewStorageConfig,
}

impl<S: BlobStore, M: MessageSerializer> ViewStorage<S, M> {
    pub fn new(store: S, serializer: M) -> Self {
        Self::with_config(store, serializer, ViewStorageConfig::default())
    }

    pub fn with_config(store: S, serializer: M, config: ViewStorageConfig) -> Self {
        Self {
            store,
            serializer,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ViewStorageConfig {
        &self.config
    }

    fn contract_name(&self, ty: MappedType) -> StorageResult<String> {
        self.serializer
            .contract_name_by_type(ty)
            .ok_or_else(|| StorageError::ContractNameMissing(ty.name().to_string()))
    }

    fn blob_name(&self, contract: &str, identity: &str) -> String {
        let file = format!("{contract}-{identity}.view").to_lowercase();
        format!("{}/{}", self.config.container, file)
    }

    /// Full blob name of the record of `ty` with `identity`.
    pub fn view_name(&self, ty: MappedType, identity: &str) -> StorageResult<String> {
        let contract = self.contract_name(ty)?;
        Ok(self.blob_name(&contract, identity))
    }

    fn decode(&self, bytes: &[u8], ty: MappedType) -> StorageResult<Box<dyn Payload>> {
        let payload = self.serializer.deserialize(bytes, ty)?;
        if (*payload).mapped_type() != ty {
            return Err(cqrs_types::Error::PayloadMismatch {
                expected: ty.name().to_string(),
            }
            .into());
        }
        Ok(payload)
    }

    fn encode(&self, payload: &dyn Payload) -> StorageResult<Vec<u8>> {
        let mut body = Vec::new();
        self.serializer.serialize(payload, &mut body)?;
        Ok(body)
    }

    /// Loads a record. A missing record is `Ok(None)`.
    pub fn load_payload(&self, ty: MappedType, identity: &str) -> StorageResult<Option<Box<dyn Payload>>> {
        let name = self.view_name(ty, identity)?;
        match self.store.read(&name, Some(self.config.read_timeout)) {
            Ok(bytes) => self.decode(&bytes, ty).map(Some),
            Err(e) if e.is_not_found() => {
                debug!("View {} not found", name);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Applies `mutate` to a stored record and writes it back if unchanged.
    ///
    /// Returns `Ok(false)` without calling `mutate` when the record does
    /// not exist.
    pub fn patch_payload(
        &self,
        ty: MappedType,
        identity: &str,
        mutate: impl FnOnce(&mut dyn Payload),
    ) -> StorageResult<bool> {
        let contract = self.contract_name(ty)?;
        let name = self.blob_name(&contract, identity);

        let (bytes, version) = match self.store.read_with_metadata(&name, Some(self.config.read_timeout)) {
            Ok(found) => found,
            Err(e) if e.is_not_found() => {
                debug!("Nothing to patch at {}", name);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let mut payload = self.decode(&bytes, ty)?;
        mutate(&mut *payload);
        let body = self.encode(&*payload)?;

        match self.store.write_if_match(&name, &body, &version) {
            Ok(_) => {
                debug!("Patched view {}", name);
                Ok(true)
            }
            Err(StoreError::ConditionFailed(_)) => {
                warn!("View {} was modified concurrently", name);
                Err(StorageError::ConcurrencyConflict {
                    contract,
                    identity: identity.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates or replaces a record.
    pub fn write_payload(&self, identity: &str, payload: &dyn Payload) -> StorageResult<()> {
        let name = self.view_name(payload.mapped_type(), identity)?;
        let body = self.encode(payload)?;
        self.store.write(&name, &body)?;
        debug!("Wrote view {} ({} bytes)", name, body.len());
        Ok(())
    }

    /// Deletes a record. Deleting a missing record succeeds.
    pub fn delete_payload(&self, ty: MappedType, identity: &str) -> StorageResult<bool> {
        let name = self.view_name(ty, identity)?;
        let existed = self.store.delete(&name)?;
        debug!("Deleted view {} (existed: {})", name, existed);
        Ok(existed)
    }

    // ── Typed wrappers ───────────────────────────────────────────

    pub fn load<T: Payload + Clone>(&self, identity: &str) -> StorageResult<Option<T>> {
        Ok(self
            .load_payload(MappedType::of::<T>(), identity)?
            .and_then(|payload| (*payload).downcast_ref::<T>().cloned()))
    }

    pub fn patch<T: Payload>(&self, identity: &str, mutate: impl FnOnce(&mut T)) -> StorageResult<bool> {
        self.patch_payload(MappedType::of::<T>(), identity, |payload| {
            if let Some(view) = payload.downcast_mut::<T>() {
                mutate(view);
            }
        })
    }

    pub fn write<T: Payload>(&self, identity: &str, view: &T) -> StorageResult<()> {
        self.write_payload(identity, view)
    }

    pub fn delete<T: Payload>(&self, identity: &str) -> StorageResult<bool> {
        self.delete_payload(MappedType::of::<T>(), identity)
    }
}

impl<S, M: std::fmt::Debug> std::fmt::Debug for ViewStorage<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewStorage")
            .field("serializer", &self.serializer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
