//! Video library data models.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage tier a video lives in.
///
/// Only `Temporary` videos are subject to eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    #[serde(rename = "temp")]
    Temporary,
    Saved,
}

impl StorageLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLocation::Temporary => "temp",
            StorageLocation::Saved => "saved",
        }
    }
}

impl std::fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger entry, keyed by source video id.
///
/// An empty `file_path` means the video is not currently materialized on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub location: StorageLocation,
    pub file_path: String,
    pub play_count: u64,
    /// Epoch milliseconds.
    pub added_at: i64,
    /// Epoch milliseconds, absent until the first play.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played: Option<i64>,
    pub file_size: u64,
    pub is_saved: bool,
}

impl VideoRecord {
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        location: StorageLocation,
        file_path: &Path,
        file_size: u64,
        added_at: i64,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            location,
            file_path: file_path.to_string_lossy().to_string(),
            play_count: 0,
            added_at,
            last_played: None,
            file_size,
            is_saved: location == StorageLocation::Saved,
        }
    }

    pub fn has_path(&self) -> bool {
        !self.file_path.is_empty()
    }

    /// Path to the encoded file, if the record has one.
    pub fn path(&self) -> Option<PathBuf> {
        if self.has_path() {
            Some(PathBuf::from(&self.file_path))
        } else {
            None
        }
    }

    /// Whether the backing file currently exists. Always hits the filesystem.
    pub fn file_exists(&self) -> bool {
        self.path().map(|p| p.is_file()).unwrap_or(false)
    }

    /// Forget the backing file while keeping the entry.
    pub fn clear_path(&mut self) {
        self.file_path.clear();
    }

    pub fn set_location(&mut self, location: StorageLocation) {
        self.location = location;
        self.is_saved = location == StorageLocation::Saved;
    }

    /// Timestamp used to order eviction candidates: last play, or insertion
    /// time for never-played videos.
    pub fn last_activity(&self) -> i64 {
        self.last_played.unwrap_or(self.added_at)
    }

    /// Size counted in aggregates. Records without a path weigh nothing,
    /// whatever stale value `file_size` still holds.
    pub fn effective_size(&self) -> u64 {
        if self.has_path() {
            self.file_size
        } else {
            0
        }
    }
}

/// A ledger entry annotated with a live existence check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListing {
    #[serde(flatten)]
    pub record: VideoRecord,
    pub exists: bool,
}

/// Aggregate counts and sizes, split by storage tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub total: usize,
    pub saved: usize,
    pub temp: usize,
    pub saved_bytes: u64,
    pub temp_bytes: u64,
    pub total_bytes: u64,
}
