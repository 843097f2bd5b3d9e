//! Device transport over locally mounted directories.
//!
//! Lets the engine run against a memory card in a reader (or any
//! directory tree) by presenting each configured mount point as one
//! volume. Listings are snapshotted at open time and served in sorted
//! order, so pagination sees a stable view even if the directory
//! changes mid-listing.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use super::{
    DateKind, DeviceVfs, DirCursor, DirEntry, DirPage, FileAttributes, Handle, MediaType,
    VolumeAttributes, VolumeInfo, VolumeRef,
};
use crate::error::DeviceError;

enum OpenKind {
    Dir { entries: Vec<DirEntry> },
    File { file: File },
}

struct MountHandle {
    local_path: PathBuf,
    kind: OpenKind,
}

struct Inner {
    handles: HashMap<u32, MountHandle>,
    next_handle: u32,
}

/// One mounted directory exposed as a device volume.
struct Mount {
    volume: VolumeRef,
    root: PathBuf,
    info: VolumeInfo,
}

/// Transport adapter over locally mounted directories.
///
/// Each mount point becomes a volume, classified as a slot-based SD
/// card by default. Dot-prefixed names are reported with the hidden
/// attribute; symlinks carry the link attribute and are never
/// followed.
pub struct LocalMountDevice {
    mounts: Vec<Mount>,
    state: Mutex<Inner>,
}

impl LocalMountDevice {
    /// Expose `paths` as volumes, in order, starting at ref 2.
    pub fn from_mounts<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mounts = paths
            .iter()
            .enumerate()
            .map(|(index, path)| Mount {
                volume: VolumeRef(index as u32 + 2),
                root: path.as_ref().to_path_buf(),
                info: VolumeInfo {
                    media_type: MediaType::SD_CARD,
                    slot: index as u32 + 1,
                    attributes: VolumeAttributes::SLOT_BASED,
                },
            })
            .collect();

        Self {
            mounts,
            state: Mutex::new(Inner {
                handles: HashMap::new(),
                next_handle: 1,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mount(&self, volume: VolumeRef) -> Result<&Mount, DeviceError> {
        self.mounts
            .iter()
            .find(|m| m.volume == volume)
            .ok_or(DeviceError::NoSuchVolume { volume: volume.0 })
    }

    /// Map a device path onto the mount's local tree.
    fn map_path(&self, volume: VolumeRef, path: &str) -> Result<PathBuf, DeviceError> {
        // Paths come from our own listings, but never let one walk out
        // of the mount
        if path.split('/').any(|part| part == "..") {
            return Err(DeviceError::Protocol(format!(
                "path escapes volume root: {path}"
            )));
        }
        let mount = self.mount(volume)?;
        Ok(mount.root.join(path.trim_start_matches('/')))
    }

    fn list_sorted(local_path: &Path, device_path: &str) -> Result<Vec<DirEntry>, DeviceError> {
        let reader = fs::read_dir(local_path).map_err(|e| Self::io_error(device_path, e))?;

        let mut entries = Vec::new();
        for result in reader {
            let entry = result.map_err(|e| Self::io_error(device_path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry
                .file_type()
                .map_err(|e| Self::io_error(device_path, e))?;

            let mut attributes = FileAttributes::empty();
            if file_type.is_dir() {
                attributes |= FileAttributes::DIRECTORY;
            }
            if file_type.is_symlink() {
                attributes |= FileAttributes::LINK;
            }
            if name.starts_with('.') {
                attributes |= FileAttributes::HIDDEN;
            }

            entries.push(DirEntry { name, attributes });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn io_error(path: &str, source: std::io::Error) -> DeviceError {
        if source.kind() == std::io::ErrorKind::NotFound {
            DeviceError::NotFound {
                path: path.to_string(),
            }
        } else {
            DeviceError::Io {
                path: path.to_string(),
                source,
            }
        }
    }

    fn with_open_file<T>(
        &self,
        handle: Handle,
        op: impl FnOnce(&PathBuf, &mut File) -> Result<T, DeviceError>,
    ) -> Result<T, DeviceError> {
        let mut state = self.state();
        let open = state
            .handles
            .get_mut(&handle.0)
            .ok_or(DeviceError::StaleHandle)?;
        let path = open.local_path.clone();
        match &mut open.kind {
            OpenKind::File { file } => op(&path, file),
            OpenKind::Dir { .. } => Err(DeviceError::Protocol(
                "file operation on a directory handle".to_string(),
            )),
        }
    }
}

impl DeviceVfs for LocalMountDevice {
    fn volumes(&self) -> Result<Vec<VolumeRef>, DeviceError> {
        Ok(self.mounts.iter().map(|m| m.volume).collect())
    }

    fn volume_info(&self, volume: VolumeRef) -> Result<VolumeInfo, DeviceError> {
        Ok(self.mount(volume)?.info)
    }

    fn open(&self, volume: VolumeRef, path: &str) -> Result<Handle, DeviceError> {
        let local_path = self.map_path(volume, path)?;
        let metadata = fs::symlink_metadata(&local_path).map_err(|e| Self::io_error(path, e))?;

        let kind = if metadata.is_dir() {
            OpenKind::Dir {
                entries: Self::list_sorted(&local_path, path)?,
            }
        } else {
            OpenKind::File {
                file: File::open(&local_path).map_err(|e| Self::io_error(path, e))?,
            }
        };

        let mut state = self.state();
        let id = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(id, MountHandle { local_path, kind });
        Ok(Handle(id))
    }

    fn enumerate_dir(
        &self,
        handle: Handle,
        cursor: DirCursor,
        max: usize,
    ) -> Result<DirPage, DeviceError> {
        let state = self.state();
        let open = state
            .handles
            .get(&handle.0)
            .ok_or(DeviceError::StaleHandle)?;
        let entries = match &open.kind {
            OpenKind::Dir { entries } => entries,
            OpenKind::File { .. } => {
                return Err(DeviceError::Protocol(
                    "enumerate on a file handle".to_string(),
                ))
            }
        };

        let start = cursor.0 as usize;
        let end = (start + max).min(entries.len());
        let page = entries.get(start..end).map(|s| s.to_vec()).unwrap_or_default();
        let next = if end >= entries.len() {
            DirCursor::END
        } else {
            DirCursor(end as u32)
        };

        Ok(DirPage {
            entries: page,
            next,
        })
    }

    fn file_size(&self, handle: Handle) -> Result<u64, DeviceError> {
        self.with_open_file(handle, |path, file| {
            file.metadata()
                .map(|m| m.len())
                .map_err(|e| Self::io_error(&path.display().to_string(), e))
        })
    }

    fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.with_open_file(handle, |path, file| {
            file.read(buf)
                .map_err(|e| Self::io_error(&path.display().to_string(), e))
        })
    }

    fn file_date(&self, handle: Handle, kind: DateKind) -> Result<SystemTime, DeviceError> {
        self.with_open_file(handle, |path, file| {
            let metadata = file
                .metadata()
                .map_err(|e| Self::io_error(&path.display().to_string(), e))?;
            let date = match kind {
                DateKind::Created => metadata.created(),
                DateKind::Modified => metadata.modified(),
                DateKind::Accessed => metadata.accessed(),
            };
            date.map_err(|e| Self::io_error(&path.display().to_string(), e))
        })
    }

    fn close(&self, handle: Handle) -> Result<(), DeviceError> {
        let mut state = self.state();
        match state.handles.remove(&handle.0) {
            Some(_) => Ok(()),
            None => Err(DeviceError::StaleHandle),
        }
    }
}
