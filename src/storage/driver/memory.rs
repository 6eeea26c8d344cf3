use std::collections::HashMap;
use std::io::Cursor;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::storage::{ArtifactReader, CacheStore, EntryMeta};

#[derive(Clone, Debug)]
struct MemoryEntry {
    data: Vec<u8>,
    committed: bool,
    modified: SystemTime,
}

/// In-memory cache store with the same lifecycle semantics as the
/// filesystem driver. Used as a test double so the engine contract can be
/// exercised without touching disk.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    retention: Duration,
}

impl MemoryStore {
    pub fn new(retention: Duration) -> Self {
        MemoryStore {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn reserve(&self, id: &str) -> Result<(), CacheError> {
        // The insert happens under the write lock, which plays the role the
        // exclusive create does on the filesystem.
        let mut entries = self.entries.write().await;
        match entries.get(id) {
            Some(entry) if entry.committed => Err(CacheError::AlreadyCommitted(id.to_string())),
            Some(_) => Err(CacheError::AlreadyReserved(id.to_string())),
            None => {
                entries.insert(
                    id.to_string(),
                    MemoryEntry {
                        data: Vec::new(),
                        committed: false,
                        modified: SystemTime::now(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn write_chunk(&self, id: &str, offset: u64, data: &[u8]) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let entry = match entries.get_mut(id) {
            Some(entry) if !entry.committed => entry,
            _ => return Err(CacheError::NoSuchReservation(id.to_string())),
        };
        let offset = offset as usize;
        let end = offset + data.len();
        if entry.data.len() < end {
            // Gap bytes between chunks read back as zeros.
            entry.data.resize(end, 0);
        }
        entry.data[offset..end].copy_from_slice(data);
        entry.modified = SystemTime::now();
        Ok(())
    }

    async fn finalize(&self, id: &str, declared_size: u64) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let entry = match entries.get_mut(id) {
            Some(entry) if !entry.committed => entry,
            _ => return Err(CacheError::NoSuchReservation(id.to_string())),
        };
        if entry.data.len() as u64 != declared_size {
            return Err(CacheError::SizeMismatch {
                expected: declared_size,
                actual: entry.data.len() as u64,
            });
        }
        entry.committed = true;
        entry.modified = SystemTime::now();
        Ok(())
    }

    async fn lookup(&self, id: &str) -> Result<Option<EntryMeta>, CacheError> {
        let mut entries = self.entries.write().await;
        let meta = match entries.get(id) {
            Some(entry) if entry.committed => EntryMeta {
                size: entry.data.len() as u64,
                modified: entry.modified,
            },
            _ => return Ok(None),
        };
        if meta.is_expired(self.retention) {
            entries.remove(id);
            return Ok(None);
        }
        Ok(Some(meta))
    }

    async fn evict(&self, id: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        if entries.get(id).is_some_and(|entry| entry.committed) {
            entries.remove(id);
        }
        Ok(())
    }

    async fn open(&self, id: &str) -> Result<Option<(EntryMeta, ArtifactReader)>, CacheError> {
        let entries = self.entries.read().await;
        match entries.get(id) {
            Some(entry) if entry.committed => {
                let meta = EntryMeta {
                    size: entry.data.len() as u64,
                    modified: entry.modified,
                };
                Ok(Some((meta, Box::new(Cursor::new(entry.data.clone())))))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::storage::ident::CacheKey;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    #[tokio::test]
    async fn lifecycle_matches_the_filesystem_driver() {
        let store = MemoryStore::new(WEEK);

        store.reserve("entry").await.unwrap();
        assert!(matches!(
            store.reserve("entry").await,
            Err(CacheError::AlreadyReserved(_))
        ));

        store.write_chunk("entry", 5, b"world").await.unwrap();
        store.write_chunk("entry", 0, b"hello").await.unwrap();
        assert!(matches!(
            store.finalize("entry", 3).await,
            Err(CacheError::SizeMismatch { .. })
        ));
        store.finalize("entry", 10).await.unwrap();

        assert!(matches!(
            store.reserve("entry").await,
            Err(CacheError::AlreadyCommitted(_))
        ));

        let (meta, mut reader) = store.open("entry").await.unwrap().unwrap();
        assert_eq!(meta.size, 10);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"helloworld");
    }

    #[tokio::test]
    async fn expired_and_empty_entries_miss() {
        let store = MemoryStore::new(Duration::ZERO);
        store.reserve("stale").await.unwrap();
        store.write_chunk("stale", 0, b"x").await.unwrap();
        store.finalize("stale", 1).await.unwrap();
        // Zero retention expires the entry as soon as it is looked up.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.lookup("stale").await.unwrap().is_none());

        let store = MemoryStore::new(WEEK);
        store.reserve("empty").await.unwrap();
        store.finalize("empty", 0).await.unwrap();
        assert!(store.lookup("empty").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_builds_the_download_locator() {
        let store = MemoryStore::new(WEEK);
        let cache_key = CacheKey::new("readme-hash", "v1").unwrap();
        let id = cache_key.encode();

        assert_eq!(store.resolve(&cache_key, "http://host").await.unwrap(), None);

        store.reserve(&id).await.unwrap();
        store.write_chunk(&id, 0, b"artifact").await.unwrap();
        store.finalize(&id, 8).await.unwrap();

        let resolved = store
            .resolve(&cache_key, "http://host")
            .await
            .unwrap()
            .expect("expected hit");
        assert_eq!(resolved.cache_key, id);
        assert_eq!(resolved.archive_location, format!("http://host/download/{id}"));
    }
}
