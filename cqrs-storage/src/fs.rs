//! File system blob store.
//!
//! Each blob is a file under the configured root; `/` in a blob name maps
//! to a directory level. A file holds a 48-byte preamble followed by the
//! blob body:
//!
//! ```text
//! [16 bytes generation][32 bytes SHA-256 of body][body]
//! ```
//!
//! The generation is a fresh random uuid on every write and is the blob's
//! version token, so any write (even one restoring earlier bytes) spends
//! the tokens handed out before it. The checksum is verified on every
//! read. Writes go to a temporary file which is then renamed over the
//! target, so the body and its generation always change together and
//! readers never see a partial blob.
//!
//! Conditional writes are serialized within one process only.

use crate::error::{StoreError, StoreResult};
use crate::store::{BlobStore, VersionToken};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const GENERATION_LEN: usize = 16;
const CHECKSUM_LEN: usize = 32;
const PREAMBLE_LEN: usize = GENERATION_LEN + CHECKSUM_LEN;

/// File store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Directory holding all containers.
    pub root: PathBuf,
    /// Read timeout used when the caller does not pass one.
    pub read_timeout: Option<Duration>,
}

impl FileStoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_timeout: None,
        }
    }
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self::new("cqrs-data")
    }
}

/// Blob store backed by a local directory.
#[derive(Debug)]
pub struct FileBlobStore {
    config: FileStoreConfig,
    write_lock: Mutex<()>,
}

fn map_io(name: &str, err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::Io(err)
    }
}

/// Builds the on-disk form of `body` under a new generation.
fn seal(body: &[u8]) -> (Vec<u8>, VersionToken) {
    let generation = Uuid::new_v4();
    let mut file = Vec::with_capacity(PREAMBLE_LEN + body.len());
    file.extend_from_slice(generation.as_bytes());
    file.extend_from_slice(&Sha256::digest(body));
    file.extend_from_slice(body);
    (file, VersionToken::new(generation.simple().to_string()))
}

/// Splits a stored file into its body and generation token.
fn unseal(name: &str, mut file: Vec<u8>) -> StoreResult<(Vec<u8>, VersionToken)> {
    if file.len() < PREAMBLE_LEN {
        return Err(StoreError::Backend(format!(
            "blob '{name}' is {} bytes, shorter than its preamble",
            file.len()
        )));
    }
    let body = file.split_off(PREAMBLE_LEN);
    let (generation, checksum) = file.split_at(GENERATION_LEN);
    if Sha256::digest(&body).as_slice() != checksum {
        warn!("Checksum mismatch for blob {}", name);
        return Err(StoreError::Backend(format!(
            "checksum mismatch for blob '{name}' (expected {}, found {})",
            hex::encode(checksum),
            hex::encode(Sha256::digest(&body))
        )));
    }
    let generation = Uuid::from_slice(generation).map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok((body, VersionToken::new(generation.simple().to_string())))
}

impl FileBlobStore {
    /// Opens a store rooted at `config.root`, creating the directory.
    pub fn open(config: FileStoreConfig) -> StoreResult<Self> {
        if !config.root.exists() {
            fs::create_dir_all(&config.root)?;
            info!("Created blob store root: {:?}", config.root);
        }
        Ok(Self {
            config,
            write_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// Maps a blob name to its file, rejecting names that escape the root.
    fn path_for(&self, name: &str) -> StoreResult<PathBuf> {
        let mut path = self.config.root.clone();
        for segment in name.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(StoreError::Backend(format!("invalid blob name: '{name}'")));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn read_file(name: &str, path: &Path) -> StoreResult<Vec<u8>> {
        fs::read(path).map_err(|e| map_io(name, e))
    }

    /// Reads on a helper thread and gives up after `timeout`.
    ///
    /// Missing files are reported without starting a thread. A read that
    /// times out is abandoned, not cancelled: its thread runs to
    /// completion and the result is dropped.
    fn read_file_bounded(name: &str, path: &Path, timeout: Duration) -> StoreResult<Vec<u8>> {
        fs::metadata(path).map_err(|e| map_io(name, e))?;

        let (tx, rx) = mpsc::channel();
        let owned = path.to_path_buf();
        thread::Builder::new()
            .name("blob-read".to_string())
            .spawn(move || {
                let _ = tx.send(fs::read(&owned));
            })?;
        match rx.recv_timeout(timeout) {
            Ok(result) => result.map_err(|e| map_io(name, e)),
            Err(RecvTimeoutError::Timeout) => {
                debug!("Read of {:?} timed out after {:?}", path, timeout);
                Err(StoreError::Timeout(name.to_string()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::Backend(format!("read of '{name}' aborted"))),
        }
    }

    fn load(&self, name: &str, timeout: Option<Duration>) -> StoreResult<(Vec<u8>, VersionToken)> {
        let path = self.path_for(name)?;
        let file = match timeout.or(self.config.read_timeout) {
            Some(limit) => Self::read_file_bounded(name, &path, limit)?,
            None => Self::read_file(name, &path)?,
        };
        unseal(name, file)
    }

    fn replace(path: &Path, file: &[u8]) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, file)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Backend("file store lock poisoned".to_string()))
    }
}

impl BlobStore for FileBlobStore {
    fn provider_name(&self) -> &'static str {
        "filesystem"
    }

    fn read(&self, name: &str, timeout: Option<Duration>) -> StoreResult<Vec<u8>> {
        self.load(name, timeout).map(|(body, _)| body)
    }

    fn read_with_metadata(&self, name: &str, timeout: Option<Duration>) -> StoreResult<(Vec<u8>, VersionToken)> {
        self.load(name, timeout)
    }

    fn write_if_match(&self, name: &str, bytes: &[u8], token: &VersionToken) -> StoreResult<VersionToken> {
        let path = self.path_for(name)?;
        let _guard = self.lock()?;

        let current = match Self::read_file(name, &path) {
            Ok(file) => unseal(name, file)?.1,
            Err(StoreError::NotFound(_)) => return Err(StoreError::ConditionFailed(name.to_string())),
            Err(e) => return Err(e),
        };
        if current != *token {
            return Err(StoreError::ConditionFailed(name.to_string()));
        }

        let (file, version) = seal(bytes);
        Self::replace(&path, &file)?;
        debug!("Conditional write to {:?} ({} bytes)", path, bytes.len());
        Ok(version)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> StoreResult<VersionToken> {
        let path = self.path_for(name)?;
        let _guard = self.lock()?;
        let (file, version) = seal(bytes);
        Self::replace(&path, &file)?;
        debug!("Wrote {:?} ({} bytes)", path, bytes.len());
        Ok(version)
    }

    fn delete(&self, name: &str) -> StoreResult<bool> {
        let path = self.path_for(name)?;
        let _guard = self.lock()?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
