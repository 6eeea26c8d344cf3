use std::time::{Duration, SystemTime};

use tokio::io::AsyncRead;

use crate::error::CacheError;
use crate::storage::ident::CacheKey;

pub mod driver;
pub mod ident;
pub mod paths;

/// Byte source for a committed artifact handed to the transport layer.
pub type ArtifactReader = Box<dyn AsyncRead + Send + Unpin>;

/// Metadata of a committed artifact.
#[derive(Clone, Copy, Debug)]
pub struct EntryMeta {
    pub size: u64,
    pub modified: SystemTime,
}

impl EntryMeta {
    /// An entry is expired when it holds no bytes, or when it is older than
    /// the retention window. A modification time in the future counts as
    /// fresh.
    pub fn is_expired(&self, retention: Duration) -> bool {
        if self.size == 0 {
            return true;
        }
        match self.modified.elapsed() {
            Ok(age) => age > retention,
            Err(_) => false,
        }
    }
}

/// A successful lookup: the identifier the artifact is addressed by, plus
/// the advisory locator an external file server resolves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub cache_key: String,
    pub archive_location: String,
}

/// The cache storage engine. One instance is shared across all in-flight
/// requests; per-identifier exclusivity is enforced by the operations
/// themselves, never by a lock around the whole store.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Creates an empty upload placeholder for `id`. Fails with
    /// [`CacheError::AlreadyCommitted`] when a committed artifact exists and
    /// with [`CacheError::AlreadyReserved`] when a placeholder does; of two
    /// concurrent reservations for one identifier exactly one succeeds.
    async fn reserve(&self, id: &str) -> Result<(), CacheError>;

    /// Writes `data` at absolute `offset` into the placeholder for `id`,
    /// extending it as needed. Chunks may arrive in any order; a gap left
    /// between chunks reads back as zero bytes. The write is durable before
    /// this returns, since `finalize` trusts the recorded length. A
    /// zero-length write at offset 0 is a valid empty upload.
    async fn write_chunk(&self, id: &str, offset: u64, data: &[u8]) -> Result<(), CacheError>;

    /// Promotes the placeholder to a committed artifact once its length
    /// matches `declared_size`; on [`CacheError::SizeMismatch`] the
    /// placeholder is left untouched. The promotion is atomic with respect
    /// to concurrent lookups.
    async fn finalize(&self, id: &str, declared_size: u64) -> Result<(), CacheError>;

    /// Returns metadata for the committed artifact, or `None` when the
    /// entry is absent or expired. Expired entries are evicted as a side
    /// effect of being looked up.
    async fn lookup(&self, id: &str) -> Result<Option<EntryMeta>, CacheError>;

    /// Removes the committed artifact for `id`. Removing an absent entry is
    /// not an error.
    async fn evict(&self, id: &str) -> Result<(), CacheError>;

    /// Opens the committed artifact for reading, or `None` when absent.
    async fn open(&self, id: &str) -> Result<Option<(EntryMeta, ArtifactReader)>, CacheError>;

    /// Resolves a cache key against the store. `Ok(None)` is a miss, a
    /// success-shaped negative distinct from a lookup failure. On a hit the
    /// locator joins `origin` with the fixed download path and the
    /// identifier.
    async fn resolve(
        &self,
        cache_key: &CacheKey,
        origin: &str,
    ) -> Result<Option<ResolvedEntry>, CacheError> {
        let id = cache_key.encode();
        match self.lookup(&id).await? {
            Some(_) => {
                let archive_location =
                    format!("{}/download/{id}", origin.trim_end_matches('/'));
                Ok(Some(ResolvedEntry {
                    cache_key: id,
                    archive_location,
                }))
            }
            None => Ok(None),
        }
    }
}
