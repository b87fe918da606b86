//! Response body store.

use super::connection::StoreDb;
use crate::Error;
use std::path::Path;

/// File name of the body store inside the cache directory.
pub const BODY_FILE: &str = "cache.sqlite";

/// Persisted mapping from request key to the last fresh response body.
#[derive(Clone, Debug)]
pub struct BodyStore {
    db: StoreDb,
}

impl BodyStore {
    /// Body store inside `dir`. Nothing is created until the first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { db: StoreDb::new(dir.as_ref().join(BODY_FILE)) }
    }

    /// Open an in-memory body store for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Ok(Self { db: StoreDb::open_in_memory().await? })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Cached body for `key`.
    ///
    /// A missing, unreadable, or corrupt store reads as "nothing cached".
    pub async fn lookup(&self, key: &str) -> Option<String> {
        match self.db.get(key).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(key, store = %self.db.path().display(), error = %e, "body store read failed");
                None
            }
        }
    }

    /// Store `body` for `key`. Empty bodies are stored as-is.
    pub async fn upsert(&self, key: &str, body: &str) -> Result<(), Error> {
        self.db.put(key, body).await
    }

    /// Forget the body for `key`. Returns true if one was stored.
    pub async fn remove(&self, key: &str) -> Result<bool, Error> {
        self.db.delete(key).await
    }

    /// Delete every body. Returns the number removed.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.db.clear().await
    }

    /// Number of stored bodies.
    pub async fn count(&self) -> Result<u64, Error> {
        self.db.count().await
    }

    /// Drop the least recently written bodies until at most `max_entries` remain.
    ///
    /// Returns the evicted keys so callers can drop matching etags.
    pub async fn evict_oldest(&self, max_entries: usize) -> Result<Vec<String>, Error> {
        self.db.evict_oldest(max_entries).await
    }
}
