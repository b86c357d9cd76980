//! Type definitions for the episode-renamer application.
//!
//! This module contains the directory entries returned by the file-listing
//! service and the set of video extensions the renamer works on.

use serde::Deserialize;

/// File extensions (lowercase, with the leading dot) treated as video files.
pub const VIDEO_EXTENSIONS: [&str; 14] = [
    ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".mpg", ".mpeg", ".ts",
    ".m2ts", ".vob", ".iso",
];

/// One entry of a remote directory listing.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FileEntry {
    /// Entry name, without any directory part.
    pub name: String,

    /// Whether the entry is a directory.
    #[serde(default)]
    pub is_dir: bool,

    /// Size in bytes (0 for directories).
    #[serde(default)]
    pub size: u64,

    /// Last modification time as reported by the server.
    #[serde(default)]
    pub modified: Option<String>,
}

impl FileEntry {
    /// Build a plain file entry with no size information.
    pub fn file(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_dir: false,
            size: 0,
            modified: None,
        }
    }

    /// Build a directory entry.
    pub fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_dir: true,
            size: 0,
            modified: None,
        }
    }

    /// Format the entry for display in listings.
    ///
    /// # Examples
    ///
    /// ```
    /// use episode_renamer::types::FileEntry;
    ///
    /// let mut entry = FileEntry::file("Show.S01E01.mkv");
    /// entry.size = 1536;
    /// assert_eq!(entry.to_display(), "Show.S01E01.mkv (1.5KB)");
    ///
    /// let dir = FileEntry::dir("Season 1");
    /// assert_eq!(dir.to_display(), "Season 1/");
    /// ```
    pub fn to_display(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            format!("{} ({})", self.name, human_size(self.size))
        }
    }
}

/// Convert a byte count into a short human-readable string.
///
/// # Examples
///
/// ```
/// use episode_renamer::types::human_size;
///
/// assert_eq!(human_size(0), "0B");
/// assert_eq!(human_size(1024 * 1024), "1.0MB");
/// ```
pub fn human_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }

    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.1}{}", size, UNITS[unit])
}

/// Join a remote directory path and an entry name.
///
/// # Examples
///
/// ```
/// use episode_renamer::types::join_remote_path;
///
/// assert_eq!(join_remote_path("/", "Anime"), "/Anime");
/// assert_eq!(join_remote_path("/Anime/", "Season 1"), "/Anime/Season 1");
/// ```
pub fn join_remote_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    format!("{}/{}", dir, name.trim_matches('/'))
}

/// Parent of a remote path; the root is its own parent.
pub fn parent_remote_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => trimmed[..i].to_string(),
    }
}
