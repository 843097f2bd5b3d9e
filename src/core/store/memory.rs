//! In-memory ledger backend for testing.

use super::{FetchKey, FetchStore, StoreStats};
use crate::error::StoreError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::SystemTime;

/// In-memory ledger backend
///
/// Useful for testing and dry runs where nothing should persist.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, SystemTime>>,
}

impl InMemoryStore {
    /// Create a new in-memory ledger
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchStore for InMemoryStore {
    fn contains(&self, key: &FetchKey) -> Result<bool, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Corrupted {
            path: PathBuf::from("memory"),
        })?;

        Ok(entries.contains_key(&key.to_string()))
    }

    fn record(&self, key: &FetchKey) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Corrupted {
            path: PathBuf::from("memory"),
        })?;

        entries
            .entry(key.to_string())
            .or_insert_with(SystemTime::now);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Corrupted {
            path: PathBuf::from("memory"),
        })?;

        entries.clear();
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Corrupted {
            path: PathBuf::from("memory"),
        })?;

        Ok(StoreStats {
            total_entries: entries.len(),
            oldest_entry: entries.values().min().copied(),
            newest_entry: entries.values().max().copied(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let store = InMemoryStore::new();
        let key = FetchKey::new("IMG_0001.jpg", 1000);

        assert!(!store.contains(&key).unwrap());
        store.record(&key).unwrap();
        assert!(store.contains(&key).unwrap());
    }

    #[test]
    fn clear_removes_all_entries() {
        let store = InMemoryStore::new();

        store.record(&FetchKey::new("a.jpg", 1)).unwrap();
        store.record(&FetchKey::new("b.jpg", 2)).unwrap();
        store.clear().unwrap();

        assert_eq!(store.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn stats_count_distinct_identities() {
        let store = InMemoryStore::new();

        store.record(&FetchKey::new("a.jpg", 1)).unwrap();
        store.record(&FetchKey::new("a.jpg", 1)).unwrap();
        store.record(&FetchKey::new("a.jpg", 2)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert!(stats.oldest_entry.is_some());
    }
}
