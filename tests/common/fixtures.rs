//! Fake external tools so tests never hit the network or need yt-dlp/ffmpeg.

use super::constants::*;
use async_trait::async_trait;
use karaoke_server::library::{Downloader, ToolError, Transcoder};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Writes `FAKE_VIDEO_BYTES` to the target after a short delay.
pub struct FakeDownloader {
    pub downloads: Arc<AtomicUsize>,
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, video_id: &str, target: &Path) -> Result<(), ToolError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        if video_id.starts_with(UNAVAILABLE_PREFIX) {
            return Err(ToolError::NonZeroExit {
                tool: "fake-yt-dlp".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Video unavailable".to_string(),
            });
        }

        tokio::fs::write(target, FAKE_VIDEO_BYTES)
            .await
            .map_err(|source| ToolError::Spawn {
                tool: "fake-yt-dlp".to_string(),
                source,
            })
    }
}

/// Copies the input unchanged.
pub struct FakeTranscoder;

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn relocate_index(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        tokio::fs::copy(input, output)
            .await
            .map(|_| ())
            .map_err(|source| ToolError::Spawn {
                tool: "fake-ffmpeg".to_string(),
                source,
            })
    }
}
