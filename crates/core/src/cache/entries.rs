//! Key/value operations on a single store.
//!
//! Every write touches exactly one key, so overlapping writers for different
//! keys never overwrite each other.

use super::connection::StoreDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl StoreDb {
    /// Get the value stored for `key`.
    ///
    /// Returns None if the store does not exist yet or the key is absent.
    pub async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let Some(conn) = self.existing().await? else {
            return Ok(None);
        };

        let key = key.to_string();
        conn.call(move |conn| -> Result<Option<String>, Error> {
            let mut stmt = conn.prepare("SELECT value FROM entries WHERE key = ?1")?;

            match stmt.query_row(params![key], |row| row.get(0)) {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(Error::from)
    }

    /// Insert or replace the value for `key`.
    ///
    /// Each write takes the next sequence number, so the entry becomes the
    /// most recently written one.
    pub async fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        let conn = self.connection().await?;

        let key = key.to_string();
        let value = value.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();

        conn.call(move |conn| -> Result<(), Error> {
            conn.execute(
                "INSERT INTO entries (key, value, seq, updated_at)
                VALUES (?1, ?2, (SELECT COALESCE(MAX(seq), 0) + 1 FROM entries), ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    seq = excluded.seq,
                    updated_at = excluded.updated_at",
                params![key, value, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(Error::from)
    }

    /// Delete the entry for `key`.
    ///
    /// Returns true if an entry was removed.
    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        let Some(conn) = self.existing().await? else {
            return Ok(false);
        };

        let key = key.to_string();
        conn.call(move |conn| -> Result<bool, Error> {
            let count = conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
            Ok(count > 0)
        })
        .await
        .map_err(Error::from)
    }

    /// Number of stored entries.
    pub async fn count(&self) -> Result<u64, Error> {
        let Some(conn) = self.existing().await? else {
            return Ok(0);
        };

        conn.call(|conn| -> Result<u64, Error> {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
        .map_err(Error::from)
    }

    /// Delete every entry.
    ///
    /// Returns the number of deleted entries.
    pub async fn clear(&self) -> Result<u64, Error> {
        let Some(conn) = self.existing().await? else {
            return Ok(0);
        };

        conn.call(|conn| -> Result<u64, Error> {
            let count = conn.execute("DELETE FROM entries", [])?;
            Ok(count as u64)
        })
        .await
        .map_err(Error::from)
    }

    /// Delete the oldest entries until at most `max_entries` remain.
    ///
    /// Returns the evicted keys, oldest first.
    pub async fn evict_oldest(&self, max_entries: usize) -> Result<Vec<String>, Error> {
        let Some(conn) = self.existing().await? else {
            return Ok(Vec::new());
        };

        let max = max_entries as i64;
        conn.call(move |conn| -> Result<Vec<String>, Error> {
            let tx = conn.transaction()?;

            let evicted = {
                let mut stmt = tx.prepare(
                    "SELECT key FROM entries WHERE key NOT IN (
                        SELECT key FROM entries ORDER BY seq DESC LIMIT ?1
                    ) ORDER BY seq ASC",
                )?;
                stmt.query_map(params![max], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?
            };

            for key in &evicted {
                tx.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
            }

            tx.commit()?;
            Ok(evicted)
        })
        .await
        .map_err(Error::from)
    }
}
