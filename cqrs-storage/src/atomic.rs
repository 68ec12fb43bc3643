//! Atomic entity store.
//!
//! Keyed upsert and delete of entities without version tokens. Locations
//! come from a [`NamingStrategy`]; bodies are JSON. The last writer wins:
//! two concurrent `add_or_update` calls may both take the add path, and
//! whichever writes last is what stays stored.

use crate::error::{StorageError, StorageResult, StoreError};
use crate::naming::{DefaultNamingStrategy, NamingStrategy};
use crate::store::BlobStore;
use cqrs_types::MappedType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};

/// Atomic store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicStorageConfig {
    /// Bound on every read. Reads are never retried.
    pub read_timeout: Duration,
}

impl Default for AtomicStorageConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(3),
        }
    }
}

/// Caller's guess about whether the entity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddOrUpdateHint {
    #[default]
    ProbablyExists,
    ProbablyDoesNotExist,
}

/// Keyed entity store for one entity type `T`.
pub struct AtomicEntityStore<T, S, N = DefaultNamingStrategy> {
    store: S,
    naming: N,
    config: AtomicStorageConfig,
    _entity: PhantomData<fn() -> T>,
}

impl<T, S> AtomicEntityStore<T, S, DefaultNamingStrategy>
where
    T: Serialize + DeserializeOwned + 'static,
    S: BlobStore,
{
    /// Store using [`DefaultNamingStrategy`].
    pub fn with_default_naming(store: S) -> Self {
        Self::new(store, DefaultNamingStrategy)
    }
}

impl<T, S, N> AtomicEntityStore<T, S, N>
where
    T: Serialize + DeserializeOwned + 'static,
    S: BlobStore,
    N: NamingStrategy,
{
    pub fn new(store: S, naming: N) -> Self {
        Self::with_config(store, naming, AtomicStorageConfig::default())
    }

    pub fn with_config(store: S, naming: N, config: AtomicStorageConfig) -> Self {
        Self {
            store,
            naming,
            config,
            _entity: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AtomicStorageConfig {
        &self.config
    }

    /// Blob name of the entity with `key`.
    pub fn entity_name<K: fmt::Display + ?Sized>(&self, key: &K) -> String {
        let ty = MappedType::of::<T>();
        format!(
            "{}/{}",
            self.naming.folder_for(ty),
            self.naming.name_for(ty, &key.to_string())
        )
    }

    fn read_entity(&self, name: &str) -> StorageResult<T> {
        let bytes = self.store.read(name, Some(self.config.read_timeout))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Loads an entity, keeping "absent" apart from "unreadable".
    ///
    /// `Ok(None)` means the store reported the entity missing; timeouts,
    /// backend failures and undecodable bodies are errors.
    pub fn try_load<K: fmt::Display + ?Sized>(&self, key: &K) -> StorageResult<Option<T>> {
        match self.read_entity(&self.entity_name(key)) {
            Ok(entity) => Ok(Some(entity)),
            Err(StorageError::Store(StoreError::NotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Loads an entity. Any failure reads as "not found".
    pub fn try_get<K: fmt::Display + ?Sized>(&self, key: &K) -> Option<T> {
        let name = self.entity_name(key);
        match self.read_entity(&name) {
            Ok(entity) => Some(entity),
            Err(StorageError::Store(StoreError::NotFound(_))) => None,
            Err(e) => {
                warn!("Treating unreadable entity {} as missing: {}", name, e);
                None
            }
        }
    }

    /// Updates the stored entity, or adds one if it cannot be read.
    ///
    /// `update` receives the stored entity; `add` runs when the read or the
    /// decode fails for any reason. The result is written unconditionally
    /// and returned.
    pub fn add_or_update<K: fmt::Display + ?Sized>(
        &self,
        key: &K,
        add: impl FnOnce() -> T,
        update: impl FnOnce(T) -> T,
        hint: AddOrUpdateHint,
    ) -> StorageResult<T> {
        let name = self.entity_name(key);
        debug!("Add or update {} ({:?})", name, hint);

        let entity = match self.read_entity(&name) {
            Ok(existing) => update(existing),
            Err(StorageError::Store(StoreError::NotFound(_))) => add(),
            Err(e) => {
                warn!("Adding over unreadable entity {}: {}", name, e);
                add()
            }
        };

        let body = serde_json::to_vec(&entity)?;
        self.store.write(&name, &body)?;
        Ok(entity)
    }

    /// Deletes an entity. Returns whether it existed.
    pub fn try_delete<K: fmt::Display + ?Sized>(&self, key: &K) -> StorageResult<bool> {
        let name = self.entity_name(key);
        let existed = self.store.delete(&name)?;
        debug!("Deleted entity {} (existed: {})", name, existed);
        Ok(existed)
    }
}

impl<T, S, N: fmt::Debug> fmt::Debug for AtomicEntityStore<T, S, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicEntityStore")
            .field("entity", &std::any::type_name::<T>())
            .field("naming", &self.naming)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
