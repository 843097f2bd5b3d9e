//! # Media Mirror
//!
//! An incremental backup tool that pulls photos and videos off a media
//! device and never fetches the same file twice.
//!
//! ## Core Philosophy
//! - **Copy once** - Every file is fetched exactly once, tracked by name and size
//! - **Never touch the device** - The source is read-only; nothing is deleted or moved
//! - **Survive bad albums** - One unreadable album never aborts the rest of the run
//!
//! ## Architecture
//! The library is split into a core engine (UI-agnostic) and presentation layers:
//! - `core` - The volume, album, and fetch machinery
//! - `events` - Event-driven progress reporting (GUI-ready)
//! - `error` - User-friendly error types
//! - `cli` - Command-line interface

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{MirrorError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
