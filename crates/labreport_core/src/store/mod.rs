//! Size-bounded key/value stores holding serialized report envelopes.
//!
//! # Responsibility
//! - Define the `DocumentStore` capability injected into the persistence
//!   engine (`get`/`set` on string keys).
//! - Provide an in-memory store and a SQLite-backed store.
//!
//! # Invariants
//! - A write that would exceed capacity fails with `CapacityExceeded` and
//!   leaves the previous value untouched.
//! - A successful `set` replaces the whole value for its key at once.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store access failure.
#[derive(Debug)]
pub enum StoreError {
    /// Writing would push the store past its byte capacity.
    CapacityExceeded { required: usize, capacity: usize },
    /// Keys must be non-empty.
    InvalidKey,
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityExceeded { required, capacity } => write!(
                f,
                "store capacity exceeded: {required} bytes required, {capacity} available"
            ),
            Self::InvalidKey => write!(f, "store key must not be empty"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::CapacityExceeded { .. } | Self::InvalidKey => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Single-slot text storage capability.
///
/// Implementations own their capacity policy; callers never pre-check and
/// read `capacity_bytes` for diagnostics only.
pub trait DocumentStore {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    /// Replaces the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    /// Total bytes (keys plus values) this store may hold.
    fn capacity_bytes(&self) -> usize;
}

/// Checks a pending write against capacity.
///
/// `others_bytes` is the footprint of every entry except `key`.
pub(crate) fn ensure_fits(
    key: &str,
    value: &str,
    others_bytes: usize,
    capacity: usize,
) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey);
    }
    let required = others_bytes
        .saturating_add(key.len())
        .saturating_add(value.len());
    if required > capacity {
        return Err(StoreError::CapacityExceeded { required, capacity });
    }
    Ok(())
}

/// Wall-clock instant in Unix epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
