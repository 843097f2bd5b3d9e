//! SQLite ledger backend for persistent storage.

use super::{default_store_path, FetchKey, FetchStore, StoreStats};
use crate::error::StoreError;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// SQLite-backed persistent ledger
///
/// Uses WAL (Write-Ahead Logging) mode so a reader (e.g. `store
/// stats` in another terminal) does not block a running sync.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create a ledger database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS fetched (
                key TEXT PRIMARY KEY,
                fetched_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    /// Open the per-user default ledger
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&default_store_path())
    }

    /// Where this ledger lives on disk
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn to_timestamp(time: SystemTime) -> i64 {
        time.duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs() as i64
    }

    fn from_timestamp(timestamp: i64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Corrupted {
            path: self.db_path.clone(),
        })
    }
}

impl FetchStore for SqliteStore {
    fn contains(&self, key: &FetchKey) -> Result<bool, StoreError> {
        let conn = self.lock()?;

        let result: Result<i64, _> = conn.query_row(
            "SELECT 1 FROM fetched WHERE key = ?",
            [&key.to_string()],
            |row| row.get(0),
        );

        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(StoreError::QueryFailed(e.to_string())),
        }
    }

    fn record(&self, key: &FetchKey) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR IGNORE INTO fetched (key, fetched_at) VALUES (?, ?)",
            params![key.to_string(), Self::to_timestamp(SystemTime::now())],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM fetched", [])
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;

        let total_entries: usize = conn
            .query_row("SELECT COUNT(*) FROM fetched", [], |row| {
                row.get::<_, i64>(0).map(|v| v as usize)
            })
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let oldest_entry: Option<SystemTime> = conn
            .query_row("SELECT MIN(fetched_at) FROM fetched", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?
            .map(Self::from_timestamp);

        let newest_entry: Option<SystemTime> = conn
            .query_row("SELECT MAX(fetched_at) FROM fetched", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?
            .map(Self::from_timestamp);

        Ok(StoreStats {
            total_entries,
            oldest_entry,
            newest_entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_the_database_and_parents() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("fetched.db");

        let store = SqliteStore::open(&db_path).unwrap();

        assert!(db_path.exists());
        assert_eq!(store.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn recorded_identity_is_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("fetched.db")).unwrap();
        let key = FetchKey::new("IMG_0001.jpg", 1000);

        assert!(!store.contains(&key).unwrap());
        store.record(&key).unwrap();
        assert!(store.contains(&key).unwrap());
    }

    #[test]
    fn same_name_different_size_is_a_different_identity() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("fetched.db")).unwrap();

        store.record(&FetchKey::new("IMG_0001.jpg", 1000)).unwrap();

        assert!(!store.contains(&FetchKey::new("IMG_0001.jpg", 1200)).unwrap());
    }

    #[test]
    fn recording_twice_keeps_one_entry() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("fetched.db")).unwrap();
        let key = FetchKey::new("IMG_0001.jpg", 1000);

        store.record(&key).unwrap();
        store.record(&key).unwrap();

        assert_eq!(store.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn identities_survive_a_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("fetched.db");
        let key = FetchKey::new("IMG_0001.jpg", 1000);

        {
            let store = SqliteStore::open(&db_path).unwrap();
            store.record(&key).unwrap();
        }

        let store = SqliteStore::open(&db_path).unwrap();
        assert!(store.contains(&key).unwrap());
    }

    // dirs resolves the data dir through XDG on Linux, which lets the
    // test point the default ledger somewhere disposable.
    #[cfg(target_os = "linux")]
    #[test]
    fn open_default_lands_in_the_user_data_dir() {
        let data_home = TempDir::new().unwrap();
        let previous = std::env::var_os("XDG_DATA_HOME");
        std::env::set_var("XDG_DATA_HOME", data_home.path());

        let store = SqliteStore::open_default().unwrap();

        assert!(store.path().starts_with(data_home.path()));
        assert!(data_home.path().join("media-mirror/fetched.db").exists());

        match previous {
            Some(value) => std::env::set_var("XDG_DATA_HOME", value),
            None => std::env::remove_var("XDG_DATA_HOME"),
        }
    }

    #[test]
    fn clear_empties_the_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("fetched.db")).unwrap();

        store.record(&FetchKey::new("a.jpg", 1)).unwrap();
        store.record(&FetchKey::new("b.jpg", 2)).unwrap();
        store.clear().unwrap();

        assert_eq!(store.stats().unwrap().total_entries, 0);
        assert!(!store.contains(&FetchKey::new("a.jpg", 1)).unwrap());
    }
}
