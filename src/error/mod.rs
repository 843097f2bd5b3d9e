//! # Error Module
//!
//! Error types for the media mirror.
//!
//! ## Design Principles
//! - **Never panic** on device data - return errors instead
//! - **Include context** - volume refs, device paths, local paths
//! - **Stay inside the album** - file and album failures are reported and
//!   aggregated, never allowed to abort the whole run
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Volume error: {0}")]
    Volume(#[from] VolumeError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Fetch ledger error: {0}")]
    Store(#[from] StoreError),

    #[error("No media found: no volume yielded a readable album")]
    NoMediaFound,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised by a device transport
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Path does not exist on the volume. Callers treat this as an
    /// expected condition, not a failure.
    #[error("Not found on device: {path}")]
    NotFound { path: String },

    #[error("No such volume: {volume}")]
    NoSuchVolume { volume: u32 },

    #[error("Operation on a closed or unknown handle")]
    StaleHandle,

    #[error("Device I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Device protocol error: {0}")]
    Protocol(String),
}

/// Errors that occur while enumerating device volumes
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("No storage volumes found on device")]
    NoVolumes,
}

/// Errors that occur while fetching one album or file
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to open {path} on device: {source}")]
    Open {
        path: String,
        #[source]
        source: DeviceError,
    },

    #[error("Failed to list {path} on device: {source}")]
    Enumerate {
        path: String,
        #[source]
        source: DeviceError,
    },

    #[error("Failed to create local directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create local file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {name} from device: {source}")]
    Read {
        name: String,
        #[source]
        source: DeviceError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Device returned {actual} bytes for {name}, expected {expected}")]
    ShortFile {
        name: String,
        expected: u64,
        actual: u64,
    },
}

/// Errors that occur with the fetched-file ledger
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open ledger database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Ledger query failed: {0}")]
    QueryFailed(String),

    #[error("Ledger corruption detected at {path}. Delete this file to re-download everything.")]
    Corrupted { path: PathBuf },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, MirrorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_includes_path() {
        let error = DeviceError::NotFound {
            path: "/DCIM/Vacation".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/DCIM/Vacation"));
    }

    #[test]
    fn fetch_error_reports_byte_counts() {
        let error = FetchError::ShortFile {
            name: "IMG_0001.jpg".to_string(),
            expected: 1000,
            actual: 500,
        };
        let message = error.to_string();
        assert!(message.contains("IMG_0001.jpg"));
        assert!(message.contains("500"));
        assert!(message.contains("1000"));
    }

    #[test]
    fn store_error_suggests_recovery() {
        let error = StoreError::Corrupted {
            path: PathBuf::from("/data/fetched.db"),
        };
        let message = error.to_string();
        assert!(message.contains("Delete this file"));
    }

    #[test]
    fn no_volumes_is_user_readable() {
        let message = VolumeError::NoVolumes.to_string();
        assert!(message.contains("No storage volumes"));
    }
}
