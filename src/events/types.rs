//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};

/// All events emitted by the sync engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Volume enumeration events
    Volume(VolumeEvent),
    /// Album discovery events
    Discover(DiscoverEvent),
    /// File fetch events
    Fetch(FetchEvent),
    /// Run-level events
    Sync(SyncEvent),
}

/// Events during volume enumeration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VolumeEvent {
    /// Enumeration has started
    Started,
    /// A volume was found and classified
    Found { volume: u32, label: String },
    /// The known-hidden volume was probed directly
    HiddenProbed { volume: u32, present: bool },
    /// Enumeration completed
    Completed { total_volumes: usize },
}

/// Events during album discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiscoverEvent {
    /// Discovery has started
    Started { total_volumes: usize },
    /// A media root does not exist on this volume
    RootMissing { volume: u32, root: String },
    /// An album was found; `name` is `None` for the unfiled album
    AlbumFound {
        volume: u32,
        root: String,
        name: Option<String>,
    },
    /// An error occurred but discovery continues
    Error {
        volume: u32,
        root: String,
        message: String,
    },
    /// Discovery completed
    Completed { total_albums: usize },
}

/// Events during the fetch phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FetchEvent {
    /// Started fetching one album
    AlbumStarted { album: String, candidates: usize },
    /// A file was copied to the mirror
    FileCopied { name: String, bytes: u64 },
    /// A file was already in the ledger and skipped
    FileSkipped { name: String },
    /// A file failed; the album continues
    FileFailed { name: String, message: String },
    /// Finished one album
    AlbumCompleted {
        album: String,
        copied: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
    /// A sync run has started
    Started { run_id: String },
    /// Moving to a new phase
    PhaseChanged { phase: SyncPhase },
    /// The run completed
    Completed { summary: SyncSummary },
    /// The run encountered a fatal error
    Error { message: String },
}

/// Phases of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    Volumes,
    Albums,
    Fetching,
}

/// Summary of one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Volumes processed
    pub volumes: usize,
    /// Albums discovered across all volumes
    pub albums: usize,
    /// Files copied to the mirror
    pub files_copied: usize,
    /// Files skipped because the ledger already had them
    pub files_skipped: usize,
    /// Files that failed to copy
    pub files_failed: usize,
    /// Bytes written to the mirror
    pub bytes_copied: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Volumes => write!(f, "Volumes"),
            SyncPhase::Albums => write!(f, "Albums"),
            SyncPhase::Fetching => write!(f, "Fetching"),
        }
    }
}
