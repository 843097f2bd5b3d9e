//! # Fetch Module
//!
//! Copies album contents into the local mirror, one file at a time,
//! skipping identities the ledger already has.
//!
//! ## Guarantees
//! - A file is copied at most once per identity (name plus size)
//! - A failed copy never leaves a partial file in the mirror
//! - Failures stay contained: a bad file costs that file, a bad album
//!   costs that album, and the run continues either way

mod filter;

pub use filter::MediaFilter;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::core::device::{read_dir_entries, DateKind, DeviceVfs, DirEntry, OpenHandle};
use crate::core::discover::Album;
use crate::core::store::{FetchKey, FetchStore};
use crate::core::sync::SyncConfig;
use crate::error::FetchError;
use crate::events::{Event, EventSender, FetchEvent};

/// What happened to one candidate file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Copied to the mirror and recorded in the ledger.
    Copied { bytes: u64 },
    /// The ledger already had this identity.
    Skipped,
    /// Copy failed; no partial file remains.
    Failed(FetchError),
}

/// Accounting for one album's fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumReport {
    pub volume: u32,
    /// Mirror directory for the album's volume.
    pub label: String,
    /// Album title as shown to the user.
    pub album: String,
    /// Directory on the device.
    pub source_dir: String,
    /// Whether the album directory could be opened at all.
    pub opened: bool,
    /// Candidates that passed the media filter.
    pub considered: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_copied: u64,
    /// Mirror paths of the files copied this run.
    pub copied_files: Vec<PathBuf>,
    /// Album-level failures (destination or listing problems).
    pub errors: Vec<String>,
}

impl AlbumReport {
    fn new(album: &Album, label: &str) -> Self {
        Self {
            volume: album.volume.0,
            label: label.to_string(),
            album: album.title(),
            source_dir: album.source_dir(),
            opened: false,
            considered: 0,
            copied: 0,
            skipped: 0,
            failed: 0,
            bytes_copied: 0,
            copied_files: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// `<label>/<album>` for progress output.
    pub fn display_path(&self) -> String {
        format!("{}/{}", self.label, self.album)
    }

    /// Opened, listed, and no file or album failures.
    pub fn succeeded(&self) -> bool {
        self.opened && self.failed == 0 && self.errors.is_empty()
    }
}

/// Copies albums into the mirror.
///
/// Borrows everything it needs for one run; construct it per sync
/// pass and drop it with the pass.
pub struct FetchEngine<'a> {
    device: &'a dyn DeviceVfs,
    store: &'a dyn FetchStore,
    config: &'a SyncConfig,
    filter: MediaFilter,
    events: &'a EventSender,
}

impl<'a> FetchEngine<'a> {
    pub fn new(
        device: &'a dyn DeviceVfs,
        store: &'a dyn FetchStore,
        config: &'a SyncConfig,
        events: &'a EventSender,
    ) -> Self {
        Self {
            device,
            store,
            config,
            filter: MediaFilter::new().with_extensions(config.extensions.clone()),
            events,
        }
    }

    /// Fetch every new file of one album.
    ///
    /// Never fails the run: all problems end up in the report.
    pub fn fetch_album(&self, album: &Album, label: &str) -> AlbumReport {
        let mut report = AlbumReport::new(album, label);
        let source = album.source_dir();

        let dir = match OpenHandle::open(self.device, album.volume, &source) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(
                    "could not open album {} on volume {}: {}",
                    source, album.volume, e
                );
                return report;
            }
        };
        report.opened = true;

        let dest_dir = match self.destination_dir(album, label) {
            Ok(dir) => dir,
            Err(e) => {
                error!("album {}: {}", report.display_path(), e);
                report.errors.push(e.to_string());
                return report;
            }
        };

        let entries =
            match read_dir_entries(&dir, self.config.enum_batch, self.config.max_enum_rounds) {
                Ok(entries) => entries,
                Err(e) => {
                    let e = FetchError::Enumerate {
                        path: source,
                        source: e,
                    };
                    warn!("album {}: {}", report.display_path(), e);
                    report.errors.push(e.to_string());
                    return report;
                }
            };

        let candidates: Vec<&DirEntry> = entries
            .iter()
            .filter(|entry| self.filter.should_fetch(entry))
            .collect();
        report.considered = candidates.len();

        self.events.send(Event::Fetch(FetchEvent::AlbumStarted {
            album: report.display_path(),
            candidates: candidates.len(),
        }));

        for entry in candidates {
            match self.fetch_file(album, entry, &dest_dir) {
                FileOutcome::Copied { bytes } => {
                    report.copied += 1;
                    report.bytes_copied += bytes;
                    report.copied_files.push(dest_dir.join(&entry.name));
                    self.events.send(Event::Fetch(FetchEvent::FileCopied {
                        name: entry.name.clone(),
                        bytes,
                    }));
                }
                FileOutcome::Skipped => {
                    report.skipped += 1;
                    self.events.send(Event::Fetch(FetchEvent::FileSkipped {
                        name: entry.name.clone(),
                    }));
                }
                FileOutcome::Failed(e) => {
                    error!("file {} in {}: {}", entry.name, report.display_path(), e);
                    report.failed += 1;
                    self.events.send(Event::Fetch(FetchEvent::FileFailed {
                        name: entry.name.clone(),
                        message: e.to_string(),
                    }));
                }
            }
        }

        self.events.send(Event::Fetch(FetchEvent::AlbumCompleted {
            album: report.display_path(),
            copied: report.copied,
            skipped: report.skipped,
            failed: report.failed,
        }));
        report
    }

    /// Copy one file unless the ledger already has its identity.
    ///
    /// Only reachable through `fetch_album`, so every entry that gets
    /// here has passed the media filter.
    fn fetch_file(&self, album: &Album, entry: &DirEntry, dest_dir: &Path) -> FileOutcome {
        let source_path = format!("{}/{}", album.source_dir(), entry.name);

        let file = match OpenHandle::open(self.device, album.volume, &source_path) {
            Ok(file) => file,
            Err(e) => {
                return FileOutcome::Failed(FetchError::Open {
                    path: source_path,
                    source: e,
                })
            }
        };

        // A device that cannot report the size can usually still read;
        // fetch unconditionally in that case.
        let size = match file.size() {
            Ok(size) => Some(size),
            Err(e) => {
                warn!(
                    "size query failed for {}, copying to end of file: {}",
                    source_path, e
                );
                None
            }
        };

        if let Some(size) = size {
            let key = FetchKey::new(&entry.name, size);
            match self.store.contains(&key) {
                Ok(true) => {
                    debug!("{} already fetched, skipping", key);
                    return FileOutcome::Skipped;
                }
                Ok(false) => {}
                // A broken lookup only costs a harmless re-copy
                Err(e) => warn!("ledger lookup failed for {}, fetching anyway: {}", key, e),
            }
        }

        let dest_path = dest_dir.join(&entry.name);
        let copied = match self.copy_stream(&file, size, &entry.name, &dest_path) {
            Ok(copied) => copied,
            Err(e) => {
                if dest_path.exists() {
                    if let Err(rm) = fs::remove_file(&dest_path) {
                        error!(
                            "could not remove partial file {}: {}",
                            dest_path.display(),
                            rm
                        );
                    }
                }
                return FileOutcome::Failed(e);
            }
        };

        // When the size query failed, the actual byte count becomes
        // the recorded identity.
        let key = FetchKey::new(&entry.name, size.unwrap_or(copied));
        if let Err(e) = self.store.record(&key) {
            warn!(
                "could not record {} in the ledger, next run will copy it again: {}",
                key, e
            );
        }

        self.propagate_timestamps(&file, &dest_path);

        debug!("copied {} ({} bytes)", source_path, copied);
        FileOutcome::Copied { bytes: copied }
    }

    /// `<mirror root>/<label>[/<album>]`, created on demand.
    fn destination_dir(&self, album: &Album, label: &str) -> Result<PathBuf, FetchError> {
        let mut dir = self.config.local_root.join(label);
        if let Some(subdir) = album.mirror_subdir() {
            dir = dir.join(subdir);
        }
        fs::create_dir_all(&dir).map_err(|e| FetchError::CreateDir {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    /// Stream the remote file into `dest` in fixed-size chunks.
    ///
    /// With a known size, reads exactly that many bytes and treats an
    /// early end of file as an error. With an unknown size, reads to
    /// end of file.
    fn copy_stream(
        &self,
        file: &OpenHandle<'_>,
        size: Option<u64>,
        name: &str,
        dest: &Path,
    ) -> Result<u64, FetchError> {
        let mut dst = File::create(dest).map_err(|e| FetchError::CreateFile {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut buffer = vec![0u8; self.config.chunk_size.max(1)];
        let mut copied: u64 = 0;

        loop {
            let want = match size {
                Some(total) => {
                    let remaining = total - copied;
                    if remaining == 0 {
                        break;
                    }
                    remaining.min(buffer.len() as u64) as usize
                }
                None => buffer.len(),
            };

            let n = file
                .read(&mut buffer[..want])
                .map_err(|e| FetchError::Read {
                    name: name.to_string(),
                    source: e,
                })?;
            if n == 0 {
                if let Some(total) = size {
                    return Err(FetchError::ShortFile {
                        name: name.to_string(),
                        expected: total,
                        actual: copied,
                    });
                }
                break;
            }

            dst.write_all(&buffer[..n]).map_err(|e| FetchError::Write {
                path: dest.to_path_buf(),
                source: e,
            })?;
            copied += n as u64;
        }

        Ok(copied)
    }

    /// Best-effort: stamp the mirror file with the device's idea of
    /// when the media was taken.
    fn propagate_timestamps(&self, file: &OpenHandle<'_>, dest: &Path) {
        let when = file
            .date(DateKind::Modified)
            .or_else(|_| file.date(DateKind::Created));
        match when {
            Ok(time) => {
                let stamp = filetime::FileTime::from_system_time(time);
                if let Err(e) = filetime::set_file_times(dest, stamp, stamp) {
                    warn!("could not set timestamps on {}: {}", dest.display(), e);
                }
            }
            Err(e) => debug!("no usable timestamp for {}: {}", dest.display(), e),
        }
    }
}
