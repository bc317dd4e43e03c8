//! Process-local store with a byte quota, the counterpart of browser
//! local storage.

use super::{ensure_fits, DocumentStore, StoreResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory bounded store.
///
/// Clones share the same entries, so a test or a UI layer can keep a
/// handle while the persistence engine owns another.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    capacity: usize,
}

impl MemoryStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    /// Bytes currently held, keys included.
    pub fn used_bytes(&self) -> usize {
        self.lock()
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave a half-written value:
        // inserts replace whole strings.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.lock();
        let others: usize = entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(existing, stored)| existing.len() + stored.len())
            .sum();
        ensure_fits(key, value, others, self.capacity)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity
    }
}
