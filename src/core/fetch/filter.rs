//! Candidate filtering for the fetch engine.

use std::collections::HashSet;

use tracing::warn;

use crate::core::device::{DirEntry, FileAttributes};

/// Decides which directory entries are media worth fetching
pub struct MediaFilter {
    /// File extensions to accept, lowercase, without dots
    extensions: HashSet<String>,
}

impl MediaFilter {
    /// Entries carrying any of these attributes are never media files.
    const REJECTED: FileAttributes = FileAttributes::HIDDEN
        .union(FileAttributes::SYSTEM)
        .union(FileAttributes::VOLUME_LABEL)
        .union(FileAttributes::DIRECTORY)
        .union(FileAttributes::LINK);

    /// Create a filter with the default media extensions.
    ///
    /// Pictures, the two video containers handheld cameras write, and
    /// the two audio-caption codecs that accompany them.
    pub fn new() -> Self {
        Self {
            extensions: ["jpg", "3gp", "3g2", "amr", "qcp"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Override the accepted extensions.
    ///
    /// Leading dots are tolerated and comparison is case-insensitive.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Check if an entry should be fetched
    pub fn should_fetch(&self, entry: &DirEntry) -> bool {
        if entry.has_path_separator() {
            warn!("rejecting path-like entry name {:?}", entry.name);
            return false;
        }
        if entry.attributes.intersects(Self::REJECTED) {
            return false;
        }

        match extension_of(&entry.name) {
            Some(ext) => self.extensions.contains(&ext.to_lowercase()),
            None => false,
        }
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn extension_of(name: &str) -> Option<&str> {
    match name.rsplit_once('.') {
        // ".nomedia" style names have no extension, just a dot prefix
        Some(("", _)) | None => None,
        Some((_, ext)) => Some(ext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            attributes: FileAttributes::empty(),
        }
    }

    fn with_attrs(name: &str, attributes: FileAttributes) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            attributes,
        }
    }

    #[test]
    fn filter_accepts_default_media_types() {
        let filter = MediaFilter::new();
        assert!(filter.should_fetch(&plain("IMG_0001.jpg")));
        assert!(filter.should_fetch(&plain("VID_0001.3gp")));
        assert!(filter.should_fetch(&plain("VID_0002.3G2")));
        assert!(filter.should_fetch(&plain("caption.AMR")));
        assert!(filter.should_fetch(&plain("caption.qcp")));
    }

    #[test]
    fn filter_excludes_other_extensions() {
        let filter = MediaFilter::new();
        assert!(!filter.should_fetch(&plain("notes.txt")));
        assert!(!filter.should_fetch(&plain("movie.mp4")));
        assert!(!filter.should_fetch(&plain("no_extension")));
        assert!(!filter.should_fetch(&plain(".nomedia")));
    }

    #[test]
    fn filter_excludes_non_file_attributes() {
        let filter = MediaFilter::new();
        assert!(!filter.should_fetch(&with_attrs("x.jpg", FileAttributes::HIDDEN)));
        assert!(!filter.should_fetch(&with_attrs("x.jpg", FileAttributes::SYSTEM)));
        assert!(!filter.should_fetch(&with_attrs("x.jpg", FileAttributes::VOLUME_LABEL)));
        assert!(!filter.should_fetch(&with_attrs("x.jpg", FileAttributes::DIRECTORY)));
        assert!(!filter.should_fetch(&with_attrs("x.jpg", FileAttributes::LINK)));
    }

    #[test]
    fn archive_and_read_only_are_still_media() {
        let filter = MediaFilter::new();
        assert!(filter.should_fetch(&with_attrs(
            "x.jpg",
            FileAttributes::ARCHIVE | FileAttributes::READ_ONLY
        )));
    }

    #[test]
    fn custom_extensions_tolerate_dots_and_case() {
        let filter =
            MediaFilter::new().with_extensions(vec![".PNG".to_string(), "jpg".to_string()]);
        assert!(filter.should_fetch(&plain("shot.png")));
        assert!(filter.should_fetch(&plain("shot.jpg")));
        assert!(!filter.should_fetch(&plain("clip.3gp")));
    }

    #[test]
    fn names_with_path_separators_are_never_media() {
        let filter = MediaFilter::new();
        assert!(!filter.should_fetch(&plain("../../escape.jpg")));
        assert!(!filter.should_fetch(&plain("evil/IMG_0001.jpg")));
        assert!(!filter.should_fetch(&plain("evil\\IMG_0001.jpg")));
    }
}
