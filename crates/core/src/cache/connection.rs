//! Database connection management with pragma configuration.
//!
//! Each store owns one SQLite file. The file (and its parent directory) is
//! created on the first write; reads against a store that was never written
//! see an empty mapping without touching the filesystem.

use super::migrations;
use crate::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_rusqlite::Connection;

const IN_MEMORY: &str = ":memory:";

/// Lazily opened handle to one store database.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Clones share the same connection.
#[derive(Clone, Debug)]
pub struct StoreDb {
    path: PathBuf,
    pub(crate) conn: Arc<OnceCell<Connection>>,
}

impl StoreDb {
    /// Create a handle for the database file at `path`.
    ///
    /// Nothing is opened or created until the first operation needs it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), conn: Arc::new(OnceCell::new()) }
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        configure(&conn).await?;

        Ok(Self { path: PathBuf::from(IN_MEMORY), conn: Arc::new(OnceCell::from(conn)) })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connection for reads. `None` when the backing file does not exist yet.
    pub(crate) async fn existing(&self) -> Result<Option<&Connection>, Error> {
        if let Some(conn) = self.conn.get() {
            return Ok(Some(conn));
        }

        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) => {
                tracing::warn!(store = %self.path.display(), error = %e, "cannot check store file, treating as absent");
                return Ok(None);
            }
        }

        self.connection().await.map(Some)
    }

    /// Connection for writes, creating the directory and file if needed.
    pub(crate) async fn connection(&self) -> Result<&Connection, Error> {
        self.conn
            .get_or_try_init(|| async {
                if let Some(parent) = self.path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|source| Error::StoreDir { path: parent.to_path_buf(), source })?;
                }

                let conn = Connection::open(&self.path)
                    .await
                    .map_err(|e| Error::Database(e.into()))?;
                configure(&conn).await?;

                tracing::debug!("opened store {}", self.path.display());
                Ok(conn)
            })
            .await
    }
}

/// Apply pragmas and run pending migrations.
async fn configure(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;",
        )?;
        Ok(())
    })
    .await
    .map_err(Error::Database)?;

    migrations::run(conn).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let conn = db.existing().await.unwrap().unwrap();
        let version = conn
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get::<_, String>(0)))
            .await
            .unwrap();
        assert!(!version.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_not_created_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.sqlite");
        let db = StoreDb::new(&path);

        assert!(db.existing().await.unwrap().is_none());
        assert!(!path.exists());
        assert!(!path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_connection_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.sqlite");
        let db = StoreDb::new(&path);

        db.connection().await.unwrap();
        assert!(path.exists());
        assert!(db.existing().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_uncheckable_path_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"a file, not a directory").unwrap();

        let db = StoreDb::new(blocker.join("store.sqlite"));
        assert!(tokio::fs::try_exists(db.path()).await.is_err());
        assert!(db.existing().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let db = StoreDb::new(&path);
        assert!(db.existing().await.is_err());
    }
}
