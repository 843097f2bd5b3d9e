//! # Store Module
//!
//! The durable ledger of files already fetched from a device.
//!
//! ## Identity
//! A file's identity is its name plus its size on the device. That is
//! deliberately cheap: no content is read to decide whether a file is
//! new. The cost is that a renamed-but-identical file downloads again
//! and a same-name-same-size replacement does not.
//!
//! ## Backends
//! - `SqliteStore` - Persistent storage using SQLite
//! - `InMemoryStore` - For testing

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::FetchStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Identity of one fetched file.
///
/// Rendered as `<name>:<size>` in the ledger. The same identity on a
/// different volume or in a different album still counts as fetched,
/// so a file that moves between albums downloads only once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub name: String,
    pub size: u64,
}

impl FetchKey {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.size)
    }
}

/// Ledger statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Total number of recorded identities
    pub total_entries: usize,
    /// Oldest record timestamp
    pub oldest_entry: Option<SystemTime>,
    /// Newest record timestamp
    pub newest_entry: Option<SystemTime>,
}

/// Default ledger location, one per local user.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media-mirror")
        .join("fetched.db")
}
