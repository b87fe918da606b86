//! Entity tag store.
//!
//! Maps a request key (the request URL) to the last `ETag` the origin sent
//! for it.

use super::connection::StoreDb;
use crate::Error;
use std::path::Path;

/// File name of the etag store inside the cache directory.
pub const ETAG_FILE: &str = "etag.sqlite";

/// Persisted mapping from request key to entity tag.
#[derive(Clone, Debug)]
pub struct EtagStore {
    db: StoreDb,
}

impl EtagStore {
    /// Etag store inside `dir`. Nothing is created until the first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { db: StoreDb::new(dir.as_ref().join(ETAG_FILE)) }
    }

    /// Open an in-memory etag store for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Ok(Self { db: StoreDb::open_in_memory().await? })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        self.db.path()
    }

    /// Stored tag for `key`.
    ///
    /// A missing, unreadable, or corrupt store reads as "no tag".
    pub async fn lookup(&self, key: &str) -> Option<String> {
        match self.db.get(key).await {
            Ok(tag) => tag,
            Err(e) => {
                tracing::warn!(key, store = %self.db.path().display(), error = %e, "etag store read failed");
                None
            }
        }
    }

    /// Record `tag` for `key`, replacing any previous tag.
    ///
    /// An empty tag is never recorded.
    pub async fn upsert(&self, key: &str, tag: &str) -> Result<(), Error> {
        if tag.is_empty() {
            return Ok(());
        }
        self.db.put(key, tag).await
    }

    /// Forget the tag for `key`. Returns true if one was stored.
    pub async fn remove(&self, key: &str) -> Result<bool, Error> {
        self.db.delete(key).await
    }

    /// Delete every tag. Returns the number removed.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.db.clear().await
    }

    /// Number of stored tags.
    pub async fn count(&self) -> Result<u64, Error> {
        self.db.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = EtagStore::new(dir.path().join("cache"));

        assert!(store.lookup("https://x/orders").await.is_none());
        assert!(!dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn test_upsert_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = EtagStore::new(dir.path().join("cache"));

        store.upsert("https://x/orders", "abc123").await.unwrap();

        assert!(dir.path().join("cache").join(ETAG_FILE).exists());
        assert_eq!(store.lookup("https://x/orders").await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_empty_tag_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = EtagStore::new(dir.path());

        store.upsert("k", "").await.unwrap();
        assert!(!store.path().exists());

        store.upsert("k", "v1").await.unwrap();
        store.upsert("k", "").await.unwrap();
        assert_eq!(store.lookup("k").await.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = EtagStore::open_in_memory().await.unwrap();
        store.upsert("k", "v2").await.unwrap();
        store.upsert("k", "v2").await.unwrap();

        assert_eq!(store.lookup("k").await.as_deref(), Some("v2"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = EtagStore::open_in_memory().await.unwrap();
        store.upsert("k1", "a").await.unwrap();
        store.upsert("k2", "b").await.unwrap();
        store.upsert("k1", "c").await.unwrap();
        store.remove("k1").await.unwrap();

        assert_eq!(store.lookup("k2").await.as_deref(), Some("b"));
        assert!(store.lookup("k1").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_store_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ETAG_FILE), vec![b'x'; 4096]).unwrap();
        let store = EtagStore::new(dir.path());

        assert!(store.lookup("k").await.is_none());
        assert!(store.upsert("k", "v1").await.is_err());
    }
}
