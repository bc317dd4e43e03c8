//! SQLite-backed store persisting keys in the `kv_entries` table.

use super::{ensure_fits, now_epoch_ms, DocumentStore, StoreResult};
use crate::db::{open_db, open_db_in_memory};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Durable bounded store on top of one SQLite connection.
///
/// The connection is `Send` but not `Sync`; callers share the store behind
/// the persistence engine's writer lock.
pub struct SqliteStore {
    conn: Connection,
    capacity: usize,
}

impl SqliteStore {
    /// Opens (creating if needed) a store file.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> StoreResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
            capacity,
        })
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory(capacity: usize) -> StoreResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
            capacity,
        })
    }

    fn bytes_excluding(&self, key: &str) -> StoreResult<usize> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
             FROM kv_entries
             WHERE key <> ?1;",
            [key],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(total).unwrap_or(usize::MAX))
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        ensure_fits(key, value, self.bytes_excluding(key)?, self.capacity)?;

        self.conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value, now_epoch_ms()],
        )?;
        Ok(())
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity
    }
}
