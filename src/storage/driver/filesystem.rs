use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::{File, OpenOptions, remove_file, rename, try_exists};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::error::CacheError;
use crate::storage::paths::PathManager;
use crate::storage::{ArtifactReader, CacheStore, EntryMeta};

/// Filesystem-backed cache store. All state lives under the data root; the
/// store itself holds nothing between requests, so expiry happens lazily on
/// the next access instead of in a background sweep.
pub struct FilesystemStore {
    path_manager: PathManager,
    retention: Duration,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>, retention: Duration) -> Self {
        FilesystemStore {
            path_manager: PathManager::new(root),
            retention,
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for FilesystemStore {
    async fn reserve(&self, id: &str) -> Result<(), CacheError> {
        if try_exists(self.path_manager.artifact_path(id)).await? {
            return Err(CacheError::AlreadyCommitted(id.to_string()));
        }
        // create_new is the test-and-set: of two concurrent reservations
        // for one identifier, exactly one observes success.
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_manager.placeholder_path(id))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(CacheError::AlreadyReserved(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_chunk(&self, id: &str, offset: u64, data: &[u8]) -> Result<(), CacheError> {
        let mut file = match OpenOptions::new()
            .write(true)
            .open(self.path_manager.placeholder_path(id))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::NoSuchReservation(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        // Seeking past EOF leaves a zero-filled gap, so out-of-order chunks
        // land at their declared offsets regardless of arrival order.
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        // finalize reads the length back from disk, so the chunk must be
        // durable before it is acknowledged.
        file.sync_all().await?;
        Ok(())
    }

    async fn finalize(&self, id: &str, declared_size: u64) -> Result<(), CacheError> {
        let placeholder = self.path_manager.placeholder_path(id);
        let meta = match tokio::fs::metadata(&placeholder).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::NoSuchReservation(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if meta.len() != declared_size {
            return Err(CacheError::SizeMismatch {
                expected: declared_size,
                actual: meta.len(),
            });
        }
        // Atomic promotion: a concurrent lookup sees either no artifact or
        // the complete one, never a partial rename.
        rename(&placeholder, self.path_manager.artifact_path(id)).await?;
        Ok(())
    }

    async fn lookup(&self, id: &str) -> Result<Option<EntryMeta>, CacheError> {
        let meta = match tokio::fs::metadata(self.path_manager.artifact_path(id)).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry = EntryMeta {
            size: meta.len(),
            modified: meta.modified()?,
        };
        if entry.is_expired(self.retention) {
            tracing::debug!(id, size = entry.size, "evicting expired cache entry");
            self.evict(id).await?;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn evict(&self, id: &str) -> Result<(), CacheError> {
        match remove_file(self.path_manager.artifact_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn open(&self, id: &str) -> Result<Option<(EntryMeta, ArtifactReader)>, CacheError> {
        let file = match File::open(self.path_manager.artifact_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta = file.metadata().await?;
        let entry = EntryMeta {
            size: meta.len(),
            modified: meta.modified()?,
        };
        Ok(Some((entry, Box::new(file))))
    }
}
