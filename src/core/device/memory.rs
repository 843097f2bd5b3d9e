//! In-memory device transport for testing.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use super::{
    DateKind, DeviceVfs, DirCursor, DirEntry, DirPage, FileAttributes, Handle, VolumeInfo,
    VolumeRef,
};
use crate::error::DeviceError;

#[derive(Debug, Clone)]
enum Node {
    Dir {
        attributes: FileAttributes,
    },
    File {
        content: Vec<u8>,
        attributes: FileAttributes,
        created: Option<SystemTime>,
        modified: Option<SystemTime>,
    },
}

#[derive(Debug, Clone)]
struct OpenState {
    volume: VolumeRef,
    path: String,
    offset: usize,
}

#[derive(Default)]
struct Inner {
    /// Refs returned by `volumes()`, in insertion order.
    listed: Vec<VolumeRef>,
    infos: HashMap<VolumeRef, VolumeInfo>,
    /// Per-volume path -> node. Sorted map so listings are deterministic.
    trees: HashMap<VolumeRef, std::collections::BTreeMap<String, Node>>,
    handles: HashMap<u32, OpenState>,
    next_handle: u32,
    next_volume: u32,
    page_limit: Option<usize>,
    volumes_error: bool,
    size_failures: Vec<(VolumeRef, String)>,
    read_failures: HashMap<(VolumeRef, String), usize>,
    /// Entries appended to one directory's listing with no node
    /// behind them, for exercising transports that report nonsense.
    raw_entries: HashMap<(VolumeRef, String), Vec<DirEntry>>,
}

/// In-memory device transport.
///
/// Backs the engine's tests: volumes, directories, and files live in a
/// map, and a handful of knobs inject the failure modes real hardware
/// produces (unlisted hidden volumes, failing size queries, reads that
/// die mid-file, tiny enumeration pages).
pub struct InMemoryDevice {
    state: Mutex<Inner>,
}

impl InMemoryDevice {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Inner {
                // Listed volumes start at ref 2; ref 1 is left for the
                // hidden internal volume, matching observed hardware.
                next_volume: 2,
                next_handle: 1,
                ..Inner::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a volume that `volumes()` reports. Returns its ref.
    pub fn add_volume(&mut self, info: VolumeInfo) -> VolumeRef {
        let mut state = self.state();
        let volume = VolumeRef(state.next_volume);
        state.next_volume += 1;
        state.listed.push(volume);
        state.infos.insert(volume, info);
        state.trees.entry(volume).or_default();
        volume
    }

    /// Add a volume that `volume_info` can see but `volumes()` omits.
    ///
    /// This is the firmware quirk the enumerator's hidden-volume probe
    /// exists for.
    pub fn add_unlisted_volume(&mut self, volume: VolumeRef, info: VolumeInfo) {
        let mut state = self.state();
        state.infos.insert(volume, info);
        state.trees.entry(volume).or_default();
    }

    /// Create a directory (and any missing parents).
    pub fn add_dir(&mut self, volume: VolumeRef, path: &str) {
        self.add_dir_with_attributes(volume, path, FileAttributes::DIRECTORY);
    }

    pub fn add_dir_with_attributes(
        &mut self,
        volume: VolumeRef,
        path: &str,
        attributes: FileAttributes,
    ) {
        let mut state = self.state();
        Self::ensure_parents(&mut state, volume, path);
        let tree = state.trees.entry(volume).or_default();
        tree.insert(
            path.to_string(),
            Node::Dir {
                attributes: attributes | FileAttributes::DIRECTORY,
            },
        );
    }

    /// Create a file (and any missing parent directories).
    pub fn add_file(&mut self, volume: VolumeRef, path: &str, content: Vec<u8>) {
        self.add_file_with_attributes(volume, path, content, FileAttributes::empty());
    }

    pub fn add_file_with_attributes(
        &mut self,
        volume: VolumeRef,
        path: &str,
        content: Vec<u8>,
        attributes: FileAttributes,
    ) {
        let mut state = self.state();
        Self::ensure_parents(&mut state, volume, path);
        let tree = state.trees.entry(volume).or_default();
        tree.insert(
            path.to_string(),
            Node::File {
                content,
                attributes,
                created: None,
                modified: None,
            },
        );
    }

    /// Record a modification timestamp for an existing file.
    pub fn set_file_modified(&mut self, volume: VolumeRef, path: &str, when: SystemTime) {
        let mut state = self.state();
        if let Some(Node::File { modified, .. }) =
            state.trees.entry(volume).or_default().get_mut(path)
        {
            *modified = Some(when);
        }
    }

    /// Cap the number of entries returned per enumeration call.
    pub fn set_page_limit(&mut self, limit: usize) {
        self.state().page_limit = Some(limit);
    }

    /// Make `volumes()` fail outright.
    pub fn fail_volume_enumeration(&mut self) {
        self.state().volumes_error = true;
    }

    /// Make the next size query for one file fail.
    pub fn fail_size_for(&mut self, volume: VolumeRef, path: &str) {
        self.state().size_failures.push((volume, path.to_string()));
    }

    /// Make reads of one file fail after `bytes` bytes.
    pub fn fail_read_after(&mut self, volume: VolumeRef, path: &str, bytes: usize) {
        self.state()
            .read_failures
            .insert((volume, path.to_string()), bytes);
    }

    /// Append an entry to one directory's listing without any node
    /// behind it, names a real filesystem could never hold included.
    pub fn add_raw_entry(&mut self, volume: VolumeRef, dir: &str, entry: DirEntry) {
        self.state()
            .raw_entries
            .entry((volume, dir.to_string()))
            .or_default()
            .push(entry);
    }

    fn ensure_parents(state: &mut Inner, volume: VolumeRef, path: &str) {
        let mut parent = Self::parent_of(path);
        let tree = state.trees.entry(volume).or_default();
        while parent != "/" {
            tree.entry(parent.to_string()).or_insert(Node::Dir {
                attributes: FileAttributes::DIRECTORY,
            });
            parent = Self::parent_of(&parent);
        }
    }

    fn parent_of(path: &str) -> String {
        match path.rsplit_once('/') {
            Some(("", _)) | None => "/".to_string(),
            Some((parent, _)) => parent.to_string(),
        }
    }

    fn children_of(tree: &std::collections::BTreeMap<String, Node>, dir: &str) -> Vec<DirEntry> {
        tree.iter()
            .filter(|(path, _)| Self::parent_of(path) == dir)
            .map(|(path, node)| {
                let name = path.rsplit_once('/').map(|(_, n)| n).unwrap_or(path);
                let attributes = match node {
                    Node::Dir { attributes } => *attributes,
                    Node::File { attributes, .. } => *attributes,
                };
                DirEntry {
                    name: name.to_string(),
                    attributes,
                }
            })
            .collect()
    }
}

impl Default for InMemoryDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceVfs for InMemoryDevice {
    fn volumes(&self) -> Result<Vec<VolumeRef>, DeviceError> {
        let state = self.state();
        if state.volumes_error {
            return Err(DeviceError::Protocol(
                "volume enumeration not supported".to_string(),
            ));
        }
        Ok(state.listed.clone())
    }

    fn volume_info(&self, volume: VolumeRef) -> Result<VolumeInfo, DeviceError> {
        let state = self.state();
        state
            .infos
            .get(&volume)
            .copied()
            .ok_or(DeviceError::NoSuchVolume { volume: volume.0 })
    }

    fn open(&self, volume: VolumeRef, path: &str) -> Result<Handle, DeviceError> {
        let mut state = self.state();
        if !state.infos.contains_key(&volume) {
            return Err(DeviceError::NoSuchVolume { volume: volume.0 });
        }
        let exists = path == "/"
            || state
                .trees
                .get(&volume)
                .is_some_and(|tree| tree.contains_key(path));
        if !exists {
            return Err(DeviceError::NotFound {
                path: path.to_string(),
            });
        }

        let id = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(
            id,
            OpenState {
                volume,
                path: path.to_string(),
                offset: 0,
            },
        );
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
        let tree = state
            .trees
            .get(&open.volume)
            .ok_or(DeviceError::NoSuchVolume {
                volume: open.volume.0,
            })?;

        if open.path != "/" && !matches!(tree.get(&open.path), Some(Node::Dir { .. })) {
            return Err(DeviceError::Protocol(format!(
                "enumerate on non-directory {}",
                open.path
            )));
        }

        let mut children = Self::children_of(tree, &open.path);
        if let Some(raw) = state.raw_entries.get(&(open.volume, open.path.clone())) {
            children.extend(raw.iter().cloned());
        }
        let start = cursor.0 as usize;
        let limit = match state.page_limit {
            Some(cap) => max.min(cap),
            None => max,
        };
        let end = (start + limit).min(children.len());
        let entries = children
            .get(start..end)
            .map(|slice| slice.to_vec())
            .unwrap_or_default();
        let next = if end >= children.len() {
            DirCursor::END
        } else {
            DirCursor(end as u32)
        };

        Ok(DirPage { entries, next })
    }

    fn file_size(&self, handle: Handle) -> Result<u64, DeviceError> {
        let mut state = self.state();
        let open = state
            .handles
            .get(&handle.0)
            .cloned()
            .ok_or(DeviceError::StaleHandle)?;
        if let Some(at) = state
            .size_failures
            .iter()
            .position(|(v, p)| *v == open.volume && *p == open.path)
        {
            // One-shot, so a later query can see the size again
            state.size_failures.remove(at);
            return Err(DeviceError::Io {
                path: open.path.clone(),
                source: std::io::Error::other("size query failed"),
            });
        }
        match state.trees.get(&open.volume).and_then(|t| t.get(&open.path)) {
            Some(Node::File { content, .. }) => Ok(content.len() as u64),
            _ => Err(DeviceError::NotFound {
                path: open.path.clone(),
            }),
        }
    }

    fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let mut state = self.state();
        let open = state
            .handles
            .get(&handle.0)
            .cloned()
            .ok_or(DeviceError::StaleHandle)?;

        let fail_after = state
            .read_failures
            .get(&(open.volume, open.path.clone()))
            .copied();
        let content = match state.trees.get(&open.volume).and_then(|t| t.get(&open.path)) {
            Some(Node::File { content, .. }) => content.clone(),
            _ => {
                return Err(DeviceError::NotFound {
                    path: open.path.clone(),
                })
            }
        };

        let end = match fail_after {
            Some(limit) => limit.min(content.len()),
            None => content.len(),
        };
        if open.offset >= end && open.offset < content.len() {
            return Err(DeviceError::Io {
                path: open.path.clone(),
                source: std::io::Error::other("read failed"),
            });
        }

        let n = buf.len().min(end.saturating_sub(open.offset));
        buf[..n].copy_from_slice(&content[open.offset..open.offset + n]);
        if let Some(open) = state.handles.get_mut(&handle.0) {
            open.offset += n;
        }
        Ok(n)
    }

    fn file_date(&self, handle: Handle, kind: DateKind) -> Result<SystemTime, DeviceError> {
        let state = self.state();
        let open = state
            .handles
            .get(&handle.0)
            .ok_or(DeviceError::StaleHandle)?;
        let date = match state.trees.get(&open.volume).and_then(|t| t.get(&open.path)) {
            Some(Node::File {
                created, modified, ..
            }) => match kind {
                DateKind::Created => *created,
                DateKind::Modified => *modified,
                DateKind::Accessed => None,
            },
            _ => None,
        };
        date.ok_or_else(|| DeviceError::Protocol(format!("no date recorded for {}", open.path)))
    }

    fn close(&self, handle: Handle) -> Result<(), DeviceError> {
        let mut state = self.state();
        match state.handles.remove(&handle.0) {
            Some(_) => Ok(()),
            None => Err(DeviceError::StaleHandle),
        }
    }
}
