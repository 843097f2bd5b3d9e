//! # Sync Module
//!
//! Orchestrates one full backup pass against a device.
//!
//! ## Phases
//! 1. **Volumes** - Enumerate storage volumes (with the hidden-volume
//!    probe)
//! 2. **Albums** - Discover albums across every volume's media roots
//! 3. **Fetching** - Copy each album's new files into the mirror
//!
//! Strictly sequential: one device, one thread, one album at a time.
//! Failures are contained at the album boundary and collected into
//! the run report.

mod engine;

pub use engine::{
    default_local_root, SyncConfig, SyncEngine, SyncEngineBuilder, SyncReport,
};
