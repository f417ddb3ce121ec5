//! Flat-file persistence for the video ledger.
//!
//! The whole mapping is serialized to a single JSON object keyed by video id
//! and rewritten wholesale on every save.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::models::VideoRecord;

pub struct Ledger {
    file_path: PathBuf,
    records: HashMap<String, VideoRecord>,
}

impl Ledger {
    fn load_records_from_file(file_path: &Path) -> std::io::Result<HashMap<String, VideoRecord>> {
        let mut file = File::open(file_path)?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Load the ledger at `file_path`.
    ///
    /// A missing file yields an empty ledger. An unreadable or corrupt file is
    /// logged and also yields an empty ledger; it gets overwritten on the next save.
    pub fn load(file_path: PathBuf) -> Ledger {
        let records = if file_path.exists() {
            match Self::load_records_from_file(&file_path) {
                Ok(records) => {
                    info!(
                        "Loaded {} ledger entries from {:?}",
                        records.len(),
                        file_path
                    );
                    records
                }
                Err(e) => {
                    warn!("Failed to load ledger from {:?}: {}", file_path, e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ledger { file_path, records }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let json_string = serde_json::to_string_pretty(&self.records)?;
        let mut file = File::create(&self.file_path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }

    /// Clear the path of every entry whose file is gone, so the next access
    /// re-fetches instead of serving stale metadata. Returns the number of
    /// entries healed.
    pub fn heal_missing_files(&mut self) -> usize {
        let mut healed = 0;
        for (video_id, record) in self.records.iter_mut() {
            if record.has_path() && !record.file_exists() {
                info!(
                    "File missing for {}, will be downloaded again if needed",
                    video_id
                );
                record.clear_path();
                healed += 1;
            }
        }
        healed
    }

    pub fn get(&self, video_id: &str) -> Option<&VideoRecord> {
        self.records.get(video_id)
    }

    pub fn get_mut(&mut self, video_id: &str) -> Option<&mut VideoRecord> {
        self.records.get_mut(video_id)
    }

    /// Insert or replace an entry, returning the previous one.
    pub fn insert(&mut self, record: VideoRecord) -> Option<VideoRecord> {
        self.records.insert(record.video_id.clone(), record)
    }

    pub fn remove(&mut self, video_id: &str) -> Option<VideoRecord> {
        self.records.remove(video_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &VideoRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
