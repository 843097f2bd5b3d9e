//! # Discover Module
//!
//! Walks each volume's media roots and produces the list of albums to
//! fetch. An album is either a subdirectory of a root or the root
//! itself, since some devices drop media directly into the root
//! instead of filing it.
//!
//! Discovery never fails a run: a missing root, an unreadable root, or
//! a listing error costs that one (volume, root) combination and
//! nothing else.

use tracing::{debug, warn};

use crate::core::device::{read_dir_entries, DeviceVfs, OpenHandle, VolumeRef};
use crate::core::sync::SyncConfig;
use crate::core::volume::Volume;
use crate::events::{DiscoverEvent, Event, EventSender};

/// Whether an album is a real subdirectory or the root itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumKind {
    /// Loose files directly inside the media root.
    Unfiled,
    /// A named subdirectory of the media root.
    Named(String),
}

/// One bucket of media files on one volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub volume: VolumeRef,
    pub root: String,
    pub kind: AlbumKind,
}

impl Album {
    pub fn unfiled(volume: VolumeRef, root: impl Into<String>) -> Self {
        Self {
            volume,
            root: root.into(),
            kind: AlbumKind::Unfiled,
        }
    }

    pub fn named(volume: VolumeRef, root: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            volume,
            root: root.into(),
            kind: AlbumKind::Named(name.into()),
        }
    }

    /// Directory on the device holding this album's files.
    pub fn source_dir(&self) -> String {
        match &self.kind {
            AlbumKind::Unfiled => self.root.clone(),
            AlbumKind::Named(name) => format!("{}/{}", self.root, name),
        }
    }

    /// Extra path segment this album contributes to the mirror, if
    /// any. Unfiled files land directly in the volume's directory.
    pub fn mirror_subdir(&self) -> Option<&str> {
        match &self.kind {
            AlbumKind::Unfiled => None,
            AlbumKind::Named(name) => Some(name),
        }
    }

    /// Human-readable name for progress output.
    pub fn title(&self) -> String {
        match &self.kind {
            AlbumKind::Unfiled => "(unfiled)".to_string(),
            AlbumKind::Named(name) => name.clone(),
        }
    }
}

/// Find every album across `volumes`.
///
/// Visits volumes in order and each configured media root in order.
/// For a root that opens, the unfiled album is emitted first, then one
/// named album per subdirectory, minus the configured exclusions.
pub fn discover_albums(
    device: &dyn DeviceVfs,
    volumes: &[Volume],
    config: &SyncConfig,
    events: &EventSender,
) -> Vec<Album> {
    events.send(Event::Discover(DiscoverEvent::Started {
        total_volumes: volumes.len(),
    }));

    let mut albums = Vec::new();
    for volume in volumes {
        for root in &config.media_roots {
            discover_root(device, volume.volume_ref, root, config, events, &mut albums);
        }
    }

    events.send(Event::Discover(DiscoverEvent::Completed {
        total_albums: albums.len(),
    }));
    albums
}

fn discover_root(
    device: &dyn DeviceVfs,
    volume: VolumeRef,
    root: &str,
    config: &SyncConfig,
    events: &EventSender,
    albums: &mut Vec<Album>,
) {
    let dir = match OpenHandle::open(device, volume, root) {
        Ok(dir) => dir,
        Err(e) => {
            debug!("root {} not usable on volume {}: {}", root, volume, e);
            events.send(Event::Discover(DiscoverEvent::RootMissing {
                volume: volume.0,
                root: root.to_string(),
            }));
            return;
        }
    };

    // The root itself holds loose media on some devices. It stands as
    // an album even if listing its children fails below.
    albums.push(Album::unfiled(volume, root));
    events.send(Event::Discover(DiscoverEvent::AlbumFound {
        volume: volume.0,
        root: root.to_string(),
        name: None,
    }));

    let entries = match read_dir_entries(&dir, config.enum_batch, config.max_enum_rounds) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "could not list albums under {} on volume {}: {}",
                root, volume, e
            );
            events.send(Event::Discover(DiscoverEvent::Error {
                volume: volume.0,
                root: root.to_string(),
                message: e.to_string(),
            }));
            return;
        }
    };

    for entry in entries {
        if !entry.is_directory() {
            continue;
        }
        if entry.has_path_separator() {
            warn!(
                "skipping path-like directory name {:?} under {}",
                entry.name, root
            );
            continue;
        }
        if config.excluded_dirs.iter().any(|d| d == &entry.name) {
            debug!("skipping excluded directory {}/{}", root, entry.name);
            continue;
        }
        albums.push(Album::named(volume, root, entry.name.clone()));
        events.send(Event::Discover(DiscoverEvent::AlbumFound {
            volume: volume.0,
            root: root.to_string(),
            name: Some(entry.name),
        }));
    }
}
