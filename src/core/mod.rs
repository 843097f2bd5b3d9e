//! # Core Module
//!
//! The UI-agnostic media backup engine.
//!
//! ## Modules
//! - `device` - Volume-addressed filesystem access to media devices
//! - `volume` - Enumerates storage volumes, including hidden ones
//! - `discover` - Finds media albums on each volume
//! - `fetch` - Copies new files and skips already-fetched ones
//! - `store` - Persists fetch records so files download only once
//! - `sync` - Orchestrates the full backup run

pub mod device;
pub mod discover;
pub mod fetch;
pub mod store;
pub mod sync;
pub mod volume;

// Re-export commonly used types
pub use device::{DeviceVfs, DirEntry, FileAttributes, InMemoryDevice, LocalMountDevice, VolumeRef};
pub use discover::{Album, AlbumKind};
pub use fetch::{AlbumReport, FetchEngine, MediaFilter};
pub use store::{FetchKey, FetchStore, InMemoryStore, SqliteStore, StoreStats};
pub use sync::{SyncConfig, SyncEngine, SyncReport};
pub use volume::Volume;
