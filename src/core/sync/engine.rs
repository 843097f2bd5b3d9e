//! Sync engine implementation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::device::{DeviceVfs, VolumeRef};
use crate::core::discover::discover_albums;
use crate::core::fetch::{AlbumReport, FetchEngine};
use crate::core::store::{FetchStore, InMemoryStore};
use crate::core::volume::enumerate_volumes;
use crate::error::MirrorError;
use crate::events::{null_sender, Event, EventSender, SyncEvent, SyncPhase, SyncSummary};

/// Result of one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Identifier for this run
    pub run_id: String,
    /// Volumes processed
    pub volumes: usize,
    /// Per-album accounting, in processing order
    pub albums: Vec<AlbumReport>,
    /// Non-fatal problems encountered (album level and up)
    pub errors: Vec<String>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Whether any volume yielded a discoverable album.
    ///
    /// A run that found nothing usually means the device was not in
    /// the expected state, so the CLI treats it as a failure.
    pub fn found_data(&self) -> bool {
        !self.albums.is_empty()
    }

    /// No album failed in any way.
    pub fn fully_succeeded(&self) -> bool {
        self.errors.is_empty() && self.albums.iter().all(AlbumReport::succeeded)
    }

    pub fn files_copied(&self) -> usize {
        self.albums.iter().map(|a| a.copied).sum()
    }

    pub fn files_skipped(&self) -> usize {
        self.albums.iter().map(|a| a.skipped).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.albums.iter().map(|a| a.failed).sum()
    }

    pub fn bytes_copied(&self) -> u64 {
        self.albums.iter().map(|a| a.bytes_copied).sum()
    }
}

/// Configuration for a sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local mirror root
    pub local_root: PathBuf,
    /// Directories to look for media in, on every volume
    pub media_roots: Vec<String>,
    /// Directory names that are never albums
    pub excluded_dirs: Vec<String>,
    /// File extensions to fetch
    pub extensions: Vec<String>,
    /// Probe for the known-hidden volume when it is not listed
    pub probe_hidden_volume: bool,
    /// Ref the hidden volume is expected at
    pub hidden_volume_ref: VolumeRef,
    /// Upper bound on volumes per run
    pub max_volumes: usize,
    /// Copy buffer size in bytes
    pub chunk_size: usize,
    /// Directory entries requested per enumeration round
    pub enum_batch: usize,
    /// Upper bound on enumeration rounds per directory
    pub max_enum_rounds: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_root: default_local_root(),
            media_roots: vec!["/DCIM".to_string(), "/Photos & Videos".to_string()],
            excluded_dirs: vec!["#Thumbnail".to_string()],
            extensions: ["jpg", "3gp", "3g2", "amr", "qcp"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            probe_hidden_volume: true,
            hidden_volume_ref: VolumeRef(1),
            max_volumes: 16,
            chunk_size: 64 * 1024,
            enum_batch: 512,
            max_enum_rounds: 1024,
        }
    }
}

/// Default mirror location under the user's home directory.
pub fn default_local_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("MediaMirror")
}

/// Builder for the sync engine
pub struct SyncEngineBuilder {
    config: SyncConfig,
    store: Option<Box<dyn FetchStore>>,
}

impl SyncEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
            store: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the mirror root
    pub fn local_root(mut self, root: PathBuf) -> Self {
        self.config.local_root = root;
        self
    }

    /// Override the accepted extensions
    pub fn extensions(mut self, extensions: Vec<String>) -> Self {
        self.config.extensions = extensions;
        self
    }

    /// Enable or disable the hidden-volume probe
    pub fn probe_hidden_volume(mut self, probe: bool) -> Self {
        self.config.probe_hidden_volume = probe;
        self
    }

    /// Set the fetch ledger
    pub fn store(mut self, store: Box<dyn FetchStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the engine.
    ///
    /// Without an explicit store the ledger lives in memory only;
    /// pass a persistent store for real use.
    pub fn build(self) -> SyncEngine {
        SyncEngine {
            config: self.config,
            store: self.store.unwrap_or_else(|| Box::new(InMemoryStore::new())),
        }
    }
}

impl Default for SyncEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The backup engine
pub struct SyncEngine {
    config: SyncConfig,
    store: Box<dyn FetchStore>,
}

impl SyncEngine {
    /// Create a new engine builder
    pub fn builder() -> SyncEngineBuilder {
        SyncEngineBuilder::new()
    }

    /// Run one sync pass without events
    pub fn run(&self, device: &dyn DeviceVfs) -> Result<SyncReport, MirrorError> {
        self.run_with_events(device, &null_sender())
    }

    /// Run one sync pass with event reporting
    pub fn run_with_events(
        &self,
        device: &dyn DeviceVfs,
        events: &EventSender,
    ) -> Result<SyncReport, MirrorError> {
        let start_time = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let mut errors = Vec::new();

        info!("starting sync run {}", run_id);
        events.send(Event::Sync(SyncEvent::Started {
            run_id: run_id.clone(),
        }));

        // Phase 1: Volumes
        events.send(Event::Sync(SyncEvent::PhaseChanged {
            phase: SyncPhase::Volumes,
        }));

        let volumes = match enumerate_volumes(device, &self.config, events) {
            Ok(volumes) => volumes,
            Err(e) => {
                events.send(Event::Sync(SyncEvent::Error {
                    message: e.to_string(),
                }));
                return Err(e.into());
            }
        };

        let labels: HashMap<VolumeRef, String> = volumes
            .iter()
            .map(|v| (v.volume_ref, v.label()))
            .collect();

        // Phase 2: Albums
        events.send(Event::Sync(SyncEvent::PhaseChanged {
            phase: SyncPhase::Albums,
        }));

        let albums = discover_albums(device, &volumes, &self.config, events);
        if albums.is_empty() {
            warn!("no albums found on any volume");
        }

        // Phase 3: Fetching
        events.send(Event::Sync(SyncEvent::PhaseChanged {
            phase: SyncPhase::Fetching,
        }));

        let fetcher = FetchEngine::new(device, self.store.as_ref(), &self.config, events);
        let mut album_reports = Vec::new();
        for album in &albums {
            let label = labels
                .get(&album.volume)
                .cloned()
                .unwrap_or_else(|| format!("card{}", album.volume.0));

            let report = fetcher.fetch_album(album, &label);
            if !report.opened {
                errors.push(format!("{}: could not open album", report.display_path()));
            }
            for e in &report.errors {
                errors.push(format!("{}: {}", report.display_path(), e));
            }
            album_reports.push(report);
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let report = SyncReport {
            run_id,
            volumes: volumes.len(),
            albums: album_reports,
            errors,
            duration_ms,
        };

        info!(
            "sync run {} finished: {} copied, {} skipped, {} failed in {} ms",
            report.run_id,
            report.files_copied(),
            report.files_skipped(),
            report.files_failed(),
            report.duration_ms
        );
        events.send(Event::Sync(SyncEvent::Completed {
            summary: SyncSummary {
                volumes: report.volumes,
                albums: report.albums.len(),
                files_copied: report.files_copied(),
                files_skipped: report.files_skipped(),
                files_failed: report.files_failed(),
                bytes_copied: report.bytes_copied(),
                duration_ms: report.duration_ms,
            },
        }));

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{InMemoryDevice, MediaType, VolumeAttributes, VolumeInfo};
    use crate::error::VolumeError;
    use tempfile::TempDir;

    #[test]
    fn builder_plumbs_the_configuration() {
        let engine = SyncEngine::builder()
            .local_root(PathBuf::from("/tmp/mirror"))
            .extensions(vec!["jpg".to_string()])
            .probe_hidden_volume(false)
            .build();

        assert_eq!(engine.config.local_root, PathBuf::from("/tmp/mirror"));
        assert_eq!(engine.config.extensions, vec!["jpg".to_string()]);
        assert!(!engine.config.probe_hidden_volume);
    }

    #[test]
    fn run_without_volumes_is_an_error() {
        let device = InMemoryDevice::new();
        let engine = SyncEngine::builder().build();

        let result = engine.run(&device);

        assert!(matches!(
            result,
            Err(MirrorError::Volume(VolumeError::NoVolumes))
        ));
    }

    #[test]
    fn run_without_albums_reports_no_data() {
        let mut device = InMemoryDevice::new();
        // A volume exists but holds no media roots
        device.add_volume(VolumeInfo::default());

        let temp = TempDir::new().unwrap();
        let engine = SyncEngine::builder()
            .local_root(temp.path().to_path_buf())
            .build();

        let report = engine.run(&device).unwrap();

        assert!(!report.found_data());
        assert_eq!(report.volumes, 1);
        assert_eq!(report.files_copied(), 0);
    }

    #[test]
    fn run_fetches_across_the_hidden_volume() {
        let mut device = InMemoryDevice::new();
        let hidden = VolumeRef(1);
        device.add_unlisted_volume(
            hidden,
            VolumeInfo {
                media_type: MediaType::INTERNAL,
                slot: 0,
                attributes: VolumeAttributes::HIDDEN,
            },
        );
        device.add_file(hidden, "/DCIM/Vacation/a.jpg", vec![0x42; 100]);

        let temp = TempDir::new().unwrap();
        let engine = SyncEngine::builder()
            .local_root(temp.path().to_path_buf())
            .build();

        let report = engine.run(&device).unwrap();

        assert!(report.found_data());
        assert_eq!(report.files_copied(), 1);
        assert!(temp.path().join("Device/Vacation/a.jpg").exists());
        assert!(report.fully_succeeded());
    }
}
