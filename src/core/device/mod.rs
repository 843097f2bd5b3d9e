//! # Device Module
//!
//! The transport capability the sync engine consumes: a handle-based
//! view of a device's storage volumes and their filesystems.
//!
//! ## Components
//! - [`DeviceVfs`] - the trait every transport implements
//! - [`OpenHandle`] - RAII guard that closes a handle on drop
//! - [`LocalMountDevice`] - adapter over locally mounted directories
//! - [`InMemoryDevice`] - in-memory fake for tests
//!
//! The engine never talks to a device directly; it is handed a
//! `&dyn DeviceVfs` and works entirely through it. A wire-protocol
//! transport for a live device plugs in the same way.

mod local;
mod memory;

pub use local::LocalMountDevice;
pub use memory::InMemoryDevice;

use std::fmt;
use std::time::SystemTime;

use bitflags::bitflags;

use crate::error::DeviceError;

/// Reference to one storage volume on a device.
///
/// Volume references are opaque small integers assigned by the
/// transport and are only meaningful for the duration of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeRef(pub u32);

impl fmt::Display for VolumeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Four-byte media-type tag reported for a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaType(pub [u8; 4]);

impl MediaType {
    /// Built-in flash storage.
    pub const INTERNAL: MediaType = MediaType(*b"TFFS");
    /// SD card.
    pub const SD_CARD: MediaType = MediaType(*b"sdig");
    /// Tag unavailable, usually because the info query failed.
    pub const UNKNOWN: MediaType = MediaType([0; 4]);
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(tag) => write!(f, "{tag}"),
            Err(_) => write!(f, "{:02x?}", self.0),
        }
    }
}

bitflags! {
    /// Attribute word reported for a volume.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VolumeAttributes: u32 {
        const READ_ONLY  = 0x01;
        const SLOT_BASED = 0x02;
        const HIDDEN     = 0x04;
    }
}

bitflags! {
    /// Attribute word reported for a directory entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FileAttributes: u32 {
        const READ_ONLY    = 0x01;
        const HIDDEN       = 0x02;
        const SYSTEM       = 0x04;
        const VOLUME_LABEL = 0x08;
        const DIRECTORY    = 0x10;
        const ARCHIVE      = 0x20;
        const LINK         = 0x40;
    }
}

/// Classification metadata for one volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeInfo {
    pub media_type: MediaType,
    /// Expansion slot number, starting at 1 for slot-based media.
    pub slot: u32,
    pub attributes: VolumeAttributes,
}

impl Default for VolumeInfo {
    fn default() -> Self {
        Self {
            media_type: MediaType::UNKNOWN,
            slot: 0,
            attributes: VolumeAttributes::empty(),
        }
    }
}

impl VolumeInfo {
    pub fn is_hidden(&self) -> bool {
        self.attributes.contains(VolumeAttributes::HIDDEN)
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub attributes: FileAttributes,
}

impl DirEntry {
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }

    /// Listings carry bare names; a separator means the transport is
    /// lying and joining the name onto a local path could escape it.
    pub fn has_path_separator(&self) -> bool {
        self.name.contains('/') || self.name.contains('\\')
    }
}

/// Position word for paginated directory enumeration.
///
/// `START` begins a listing; the transport hands back the cursor for
/// the next page until it returns `END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirCursor(pub u32);

impl DirCursor {
    pub const START: DirCursor = DirCursor(0);
    pub const END: DirCursor = DirCursor(0xFFFF_FFFF);

    pub fn is_end(&self) -> bool {
        *self == Self::END
    }
}

/// One page of a directory listing.
#[derive(Debug, Clone)]
pub struct DirPage {
    pub entries: Vec<DirEntry>,
    pub next: DirCursor,
}

/// Which timestamp to query for an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Created,
    Modified,
    Accessed,
}

/// Opaque handle to an open file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u32);

/// Read-only, handle-based access to a device's volumes.
///
/// Implementations are synchronous; the engine drives them from a
/// single thread. All opens are read-only. Paths use `/` separators
/// and are absolute within their volume.
pub trait DeviceVfs: Send + Sync {
    /// List the volume references the device reports.
    ///
    /// Some firmware omits hidden volumes here even though they can be
    /// opened; see [`crate::core::volume::enumerate_volumes`] for the
    /// probe that compensates.
    fn volumes(&self) -> Result<Vec<VolumeRef>, DeviceError>;

    /// Classification metadata for one volume.
    ///
    /// Succeeds for volumes missing from [`DeviceVfs::volumes`] if the
    /// volume actually exists.
    fn volume_info(&self, volume: VolumeRef) -> Result<VolumeInfo, DeviceError>;

    /// Open a file or directory for reading.
    ///
    /// Returns [`DeviceError::NotFound`] when the path does not exist;
    /// callers treat that as an expected condition.
    fn open(&self, volume: VolumeRef, path: &str) -> Result<Handle, DeviceError>;

    /// Fetch up to `max` entries of an open directory, starting at
    /// `cursor`. The returned page carries the cursor for the next
    /// call, or [`DirCursor::END`] when the listing is exhausted.
    fn enumerate_dir(
        &self,
        handle: Handle,
        cursor: DirCursor,
        max: usize,
    ) -> Result<DirPage, DeviceError>;

    /// Size in bytes of an open file.
    fn file_size(&self, handle: Handle) -> Result<u64, DeviceError>;

    /// Read the next bytes of an open file into `buf`. Returns the
    /// number of bytes read; 0 means end of file.
    fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<usize, DeviceError>;

    /// One of the file's timestamps.
    fn file_date(&self, handle: Handle, kind: DateKind) -> Result<SystemTime, DeviceError>;

    /// Release an open handle.
    fn close(&self, handle: Handle) -> Result<(), DeviceError>;
}

/// RAII guard for an open device handle.
///
/// Closes the handle when dropped, so early returns in engine code
/// cannot leak handles on the device side.
pub struct OpenHandle<'a> {
    device: &'a dyn DeviceVfs,
    handle: Handle,
}

impl<'a> OpenHandle<'a> {
    /// Open `path` on `volume` and wrap the handle.
    pub fn open(
        device: &'a dyn DeviceVfs,
        volume: VolumeRef,
        path: &str,
    ) -> Result<OpenHandle<'a>, DeviceError> {
        let handle = device.open(volume, path)?;
        Ok(OpenHandle { device, handle })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn enumerate(&self, cursor: DirCursor, max: usize) -> Result<DirPage, DeviceError> {
        self.device.enumerate_dir(self.handle, cursor, max)
    }

    pub fn size(&self) -> Result<u64, DeviceError> {
        self.device.file_size(self.handle)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.device.read(self.handle, buf)
    }

    pub fn date(&self, kind: DateKind) -> Result<SystemTime, DeviceError> {
        self.device.file_date(self.handle, kind)
    }
}

impl Drop for OpenHandle<'_> {
    fn drop(&mut self) {
        // A close failure here has no caller to report to
        let _ = self.device.close(self.handle);
    }
}

/// Drive a full paginated listing of an open directory.
///
/// Keeps requesting pages of `batch` entries until the transport
/// returns the terminal cursor. `max_rounds` bounds the loop against a
/// transport whose cursor never terminates; a cursor that stops
/// advancing while returning no entries is reported as a protocol
/// error immediately.
pub fn read_dir_entries(
    dir: &OpenHandle<'_>,
    batch: usize,
    max_rounds: u32,
) -> Result<Vec<DirEntry>, DeviceError> {
    let mut entries = Vec::new();
    let mut cursor = DirCursor::START;

    for _ in 0..max_rounds {
        let page = dir.enumerate(cursor, batch)?;
        let stalled = page.entries.is_empty() && page.next == cursor;
        entries.extend(page.entries);

        if page.next.is_end() {
            return Ok(entries);
        }
        if stalled {
            return Err(DeviceError::Protocol(format!(
                "directory cursor stalled at {}",
                cursor.0
            )));
        }
        cursor = page.next;
    }

    Err(DeviceError::Protocol(format!(
        "directory listing did not terminate within {max_rounds} rounds"
    )))
}
