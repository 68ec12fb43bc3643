//! Record and entity storage for the CQRS framework.
//!
//! Two read-modify-write primitives over a named blob store:
//!
//! - [`ViewStorage`] keeps keyed, versioned records. `patch` writes back
//!   only if the record is unchanged since it was read and reports
//!   [`StorageError::ConcurrencyConflict`] otherwise.
//! - [`AtomicEntityStore`] keeps keyed entities without versions. Reads
//!   are bounded by a short timeout, unreadable entities count as missing
//!   and the last writer wins.
//!
//! Both run on any [`BlobStore`]. [`MemoryBlobStore`] and
//! [`FileBlobStore`] are provided.
//!
//! # Architecture
//!
//! - The blob store's conditional write is the only synchronization; the
//!   stores themselves take no locks
//! - Calls are blocking
//! - Record bodies go through the framework's payload serializer; entity
//!   bodies are JSON

mod atomic;
mod error;
mod fs;
mod memory;
mod naming;
mod store;
mod views;

pub use atomic::{AddOrUpdateHint, AtomicEntityStore, AtomicStorageConfig};
pub use error::{StorageError, StorageResult, StoreError, StoreResult};
pub use fs::{FileBlobStore, FileStoreConfig};
pub use memory::MemoryBlobStore;
pub use naming::{DefaultNamingStrategy, NamingStrategy};
pub use store::{BlobStore, VersionToken};
pub use views::{ViewStorage, ViewStorageConfig};
