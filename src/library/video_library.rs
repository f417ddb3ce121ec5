//! On-disk video cache with download/encode orchestration and eviction.
//!
//! The ledger lives behind a synchronous mutex that is never held across an
//! await point: external tools run unlocked, and the ledger is only touched
//! to decide the target location before a fetch and to commit its result.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use byte_unit::Byte;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::ledger::Ledger;
use super::media_tools::{Downloader, ToolError, Transcoder};
use super::models::{LibraryStats, StorageLocation, VideoListing, VideoRecord};
use crate::config::LibrarySettings;
use crate::server::metrics;

/// Errors surfaced by library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("fetch failed for {video_id}: {source}")]
    Fetch {
        video_id: String,
        #[source]
        source: ToolError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("video not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Video ids end up in file names, so only a conservative charset is allowed.
fn validate_video_id(video_id: &str) -> Result<(), LibraryError> {
    let valid = !video_id.is_empty()
        && video_id.len() <= 64
        && video_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LibraryError::InvalidArgument(format!(
            "invalid video id: {:?}",
            video_id
        )))
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Best-effort removal of a file we created; absence is fine.
async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed leftover file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove leftover file {:?}: {}", path, e),
    }
}

pub struct VideoLibrary {
    settings: LibrarySettings,
    ledger: Mutex<Ledger>,
    downloader: Arc<dyn Downloader>,
    transcoder: Arc<dyn Transcoder>,
}

impl VideoLibrary {
    /// Create the storage directories, load the ledger and clear every path
    /// whose file has disappeared since the last run.
    pub fn open(
        settings: LibrarySettings,
        downloader: Arc<dyn Downloader>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self, LibraryError> {
        std::fs::create_dir_all(&settings.temp_path)?;
        std::fs::create_dir_all(&settings.saved_path)?;
        if let Some(parent) = settings.metadata_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut ledger = Ledger::load(settings.metadata_file.clone());
        let healed = ledger.heal_missing_files();
        if healed > 0 {
            info!("Cleared {} stale file paths from the ledger", healed);
            if let Err(e) = ledger.save() {
                warn!("Failed to persist healed ledger: {}", e);
            }
        }

        let library = Self {
            settings,
            ledger: Mutex::new(ledger),
            downloader,
            transcoder,
        };
        library.publish_gauges();
        Ok(library)
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_dir(&self, location: StorageLocation) -> &Path {
        match location {
            StorageLocation::Temporary => &self.settings.temp_path,
            StorageLocation::Saved => &self.settings.saved_path,
        }
    }

    fn file_name(video_id: &str) -> String {
        format!("{}.mp4", video_id)
    }

    /// True iff the ledger has a path for `video_id` and that file exists right now.
    pub fn has_local(&self, video_id: &str) -> bool {
        self.ledger()
            .get(video_id)
            .map(|record| record.file_exists())
            .unwrap_or(false)
    }

    /// Path of the local file, or `None` when the caller has to fetch it first.
    pub fn resolve_path(&self, video_id: &str) -> Option<PathBuf> {
        let ledger = self.ledger();
        let record = ledger.get(video_id)?;
        if record.file_exists() {
            record.path()
        } else {
            None
        }
    }

    pub fn video_info(&self, video_id: &str) -> Option<VideoRecord> {
        self.ledger().get(video_id).cloned()
    }

    /// Download and transcode `video_id`, then commit it to the ledger.
    ///
    /// Concurrent calls for the same id are not deduplicated here; they race
    /// on the same target path. Use [`super::FetchCoordinator`] when that matters.
    ///
    /// On any failure the ledger is left untouched, so a retry is safe.
    pub async fn fetch_and_materialize(
        &self,
        video_id: &str,
        title: &str,
    ) -> Result<PathBuf, LibraryError> {
        validate_video_id(video_id)?;

        let location = self
            .ledger()
            .get(video_id)
            .map(|record| record.location)
            .unwrap_or(StorageLocation::Temporary);

        let dir = self.store_dir(location).to_path_buf();
        let target = dir.join(Self::file_name(video_id));
        let side_file = dir.join(format!("{}_faststart.mp4", video_id));
        let target_existed = tokio::fs::metadata(&target).await.is_ok();

        info!("Downloading video {} to {} store", video_id, location);

        if let Err(source) = self.downloader.download(video_id, &target).await {
            if !target_existed {
                remove_if_exists(&target).await;
            }
            metrics::record_library_fetch("failed");
            return Err(LibraryError::Fetch {
                video_id: video_id.to_string(),
                source,
            });
        }

        debug!("Download of {} complete, moving index to the front", video_id);

        if let Err(source) = self.transcoder.relocate_index(&target, &side_file).await {
            remove_if_exists(&side_file).await;
            if !target_existed {
                remove_if_exists(&target).await;
            }
            metrics::record_library_fetch("failed");
            return Err(LibraryError::Fetch {
                video_id: video_id.to_string(),
                source,
            });
        }

        if let Err(e) = tokio::fs::rename(&side_file, &target).await {
            remove_if_exists(&side_file).await;
            metrics::record_library_fetch("failed");
            return Err(e.into());
        }

        let file_size = match tokio::fs::metadata(&target).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                metrics::record_library_fetch("failed");
                return Err(e.into());
            }
        };

        let (location, target) = {
            let mut ledger = self.ledger();

            // A promotion may have landed while the download was running.
            let current = ledger
                .get(video_id)
                .map(|record| record.location)
                .unwrap_or(location);
            let target = if current != location {
                let moved = self.store_dir(current).join(Self::file_name(video_id));
                if let Err(e) = std::fs::rename(&target, &moved) {
                    error!(
                        "Failed to move {} into the {} store: {}",
                        video_id, current, e
                    );
                    if !target_existed {
                        if let Err(e) = std::fs::remove_file(&target) {
                            warn!("Failed to remove leftover file {:?}: {}", target, e);
                        }
                    }
                    metrics::record_library_fetch("failed");
                    return Err(e.into());
                }
                info!(
                    "Video {} was promoted during its fetch, moved to {} store",
                    video_id, current
                );
                moved
            } else {
                target
            };

            let previous = ledger.get(video_id).cloned();
            match ledger.get_mut(video_id) {
                Some(record) => {
                    record.file_path = target.to_string_lossy().to_string();
                    record.file_size = file_size;
                }
                None => {
                    ledger.insert(VideoRecord::new(
                        video_id,
                        title,
                        current,
                        &target,
                        file_size,
                        now_millis(),
                    ));
                }
            }

            if let Err(e) = ledger.save() {
                match previous {
                    Some(record) => {
                        ledger.insert(record);
                    }
                    None => {
                        ledger.remove(video_id);
                    }
                }
                metrics::record_library_fetch("failed");
                return Err(e.into());
            }

            if current == StorageLocation::Temporary {
                self.evict_locked(&mut ledger, Some(video_id));
            }
            (current, target)
        };

        metrics::record_library_fetch("downloaded");
        self.publish_gauges();
        info!(
            "Video ready: {} ({:#}) [{}]",
            video_id,
            Byte::from(file_size),
            location
        );

        Ok(target)
    }

    /// Count a playback. Crossing the auto-save threshold promotes an
    /// unsaved video as a side effect. Unknown ids are ignored.
    pub fn record_play(&self, video_id: &str) -> Result<(), LibraryError> {
        let mut ledger = self.ledger();
        let Some(record) = ledger.get_mut(video_id) else {
            debug!("record_play for unknown video {}, ignoring", video_id);
            return Ok(());
        };

        record.play_count += 1;
        record.last_played = Some(now_millis());
        let play_count = record.play_count;
        let is_saved = record.is_saved;

        info!("Play recorded for {}: {} plays", video_id, play_count);

        if !is_saved && play_count >= self.settings.auto_save_threshold {
            info!("Auto-saving {} after {} plays", video_id, play_count);
            self.promote_locked(&mut ledger, video_id);
            drop(ledger);
            self.publish_gauges();
            Ok(())
        } else {
            ledger.save()?;
            Ok(())
        }
    }

    /// Move a video into the saved store so it is never evicted.
    ///
    /// Returns `Ok(true)` when already saved or when the promotion succeeded,
    /// `Ok(false)` when the filesystem move failed (the ledger keeps its
    /// previous state), and `NotFound` for ids without a ledger entry.
    pub fn promote_to_saved(&self, video_id: &str) -> Result<bool, LibraryError> {
        let mut ledger = self.ledger();
        let Some(record) = ledger.get(video_id) else {
            return Err(LibraryError::NotFound(video_id.to_string()));
        };
        if record.is_saved {
            return Ok(true);
        }

        let promoted = self.promote_locked(&mut ledger, video_id);
        drop(ledger);
        self.publish_gauges();
        Ok(promoted)
    }

    fn promote_locked(&self, ledger: &mut Ledger, video_id: &str) -> bool {
        let Some(previous) = ledger.get(video_id).cloned() else {
            return false;
        };

        let new_path = self.settings.saved_path.join(Self::file_name(video_id));
        let old_path = previous.path().filter(|p| p.is_file());

        if let Some(old_path) = &old_path {
            if let Err(e) = std::fs::rename(old_path, &new_path) {
                error!("Failed to move {} to saved store: {}", video_id, e);
                return false;
            }
            info!("Moved {} to saved store", video_id);
        } else {
            info!(
                "File not present for {}, it will be fetched into the saved store",
                video_id
            );
        }

        if let Some(record) = ledger.get_mut(video_id) {
            record.set_location(StorageLocation::Saved);
            if old_path.is_some() {
                record.file_path = new_path.to_string_lossy().to_string();
            } else {
                record.clear_path();
            }
        }

        if let Err(e) = ledger.save() {
            error!("Failed to persist promotion of {}: {}", video_id, e);
            if let Some(old_path) = &old_path {
                if let Err(e) = std::fs::rename(&new_path, old_path) {
                    error!("Failed to move {} back after rollback: {}", video_id, e);
                }
            }
            ledger.insert(previous);
            return false;
        }

        metrics::record_library_promotion();
        true
    }

    /// Delete the files of the least recently active temporary videos until
    /// at most `max_temp_videos` remain materialized. Returns how many were
    /// evicted.
    pub fn evict_excess_temporary(&self) -> usize {
        let evicted = {
            let mut ledger = self.ledger();
            self.evict_locked(&mut ledger, None)
        };
        if evicted > 0 {
            self.publish_gauges();
        }
        evicted
    }

    /// `keep` is never chosen as a victim, though it still counts towards
    /// the cap. A video refetched for playback may carry old activity.
    fn evict_locked(&self, ledger: &mut Ledger, keep: Option<&str>) -> usize {
        let mut candidates: Vec<(i64, i64, String)> = ledger
            .records()
            // Anything occupying the path counts towards the cap.
            .filter(|r| {
                r.location == StorageLocation::Temporary
                    && r.path().map(|p| p.exists()).unwrap_or(false)
            })
            .map(|r| (r.last_activity(), r.added_at, r.video_id.clone()))
            .collect();

        let max = self.settings.max_temp_videos;
        if candidates.len() <= max {
            return 0;
        }

        candidates.sort();
        let excess = candidates.len() - max;

        let victims = candidates
            .into_iter()
            .filter(|(_, _, id)| Some(id.as_str()) != keep)
            .take(excess);

        let mut evicted = 0;
        for (_, _, video_id) in victims {
            let Some(record) = ledger.get_mut(&video_id) else {
                continue;
            };

            info!(
                "Evicting temporary video {} ({} plays)",
                video_id, record.play_count
            );
            match std::fs::remove_file(&record.file_path) {
                Ok(()) => {
                    record.clear_path();
                    evicted += 1;
                }
                Err(e) => {
                    warn!("Failed to delete {}: {}", video_id, e);
                }
            }
        }

        if evicted > 0 {
            metrics::record_library_evictions(evicted);
            if let Err(e) = ledger.save() {
                warn!("Failed to persist ledger after eviction: {}", e);
            }
        }

        evicted
    }

    /// Aggregate counts and sizes from the in-memory ledger. Not disk-verified.
    pub fn stats(&self) -> LibraryStats {
        let ledger = self.ledger();
        let mut stats = LibraryStats::default();
        for record in ledger.records() {
            stats.total += 1;
            if record.is_saved {
                stats.saved += 1;
                stats.saved_bytes += record.effective_size();
            } else {
                stats.temp += 1;
                stats.temp_bytes += record.effective_size();
            }
        }
        stats.total_bytes = stats.saved_bytes + stats.temp_bytes;
        stats
    }

    /// Every ledger entry with a live existence check.
    pub fn list_all(&self) -> Vec<VideoListing> {
        let ledger = self.ledger();
        let mut listings: Vec<VideoListing> = ledger
            .records()
            .map(|record| VideoListing {
                exists: record.file_exists(),
                record: record.clone(),
            })
            .collect();
        listings.sort_by(|a, b| a.record.added_at.cmp(&b.record.added_at));
        listings
    }

    fn publish_gauges(&self) {
        let stats = self.stats();
        metrics::set_library_videos(stats.saved, stats.temp);
    }
}
