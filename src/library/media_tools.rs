//! External download and transcode tools (yt-dlp / ffmpeg).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors that can occur while running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    NonZeroExit {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} produced no output at {path:?}")]
    EmptyOutput { tool: String, path: PathBuf },

    #[error("{tool} timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },
}

/// Produces a locally playable mp4 container for a source video.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, video_id: &str, target: &Path) -> Result<(), ToolError>;
}

/// Rewrites a container so its index precedes the media payload.
///
/// Implementations write to `output` and leave `input` untouched; swapping
/// the result into place is up to the caller.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn relocate_index(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Fails with `EmptyOutput` unless `path` is a non-empty file.
pub async fn ensure_output(tool: &str, path: &Path) -> Result<(), ToolError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(ToolError::EmptyOutput {
            tool: tool.to_string(),
            path: path.to_path_buf(),
        }),
    }
}

async fn run_tool(tool: &str, command: &mut Command, timeout: Option<Duration>) -> Result<(), ToolError> {
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output_future = command.output();
    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, output_future).await {
            Ok(result) => result,
            Err(_) => {
                return Err(ToolError::TimedOut {
                    tool: tool.to_string(),
                    secs: limit.as_secs(),
                })
            }
        },
        None => output_future.await,
    }
    .map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::NonZeroExit {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(())
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

/// yt-dlp selector for an mp4 no taller than `max_height`, with m4a audio.
pub fn format_selector(max_height: u32) -> String {
    format!(
        "bestvideo[ext=mp4][height<={h}]+bestaudio[ext=m4a]/best[ext=mp4][height<={h}]/best",
        h = max_height
    )
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub struct YtDlpDownloader {
    binary: PathBuf,
    max_height: u32,
    timeout: Option<Duration>,
}

impl YtDlpDownloader {
    pub fn new(binary: PathBuf, max_height: u32, timeout_sec: u64) -> Self {
        Self {
            binary,
            max_height,
            timeout: timeout_from_secs(timeout_sec),
        }
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(&self, video_id: &str, target: &Path) -> Result<(), ToolError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ToolError::Spawn {
                    tool: "yt-dlp".to_string(),
                    source,
                })?;
        }

        debug!("yt-dlp {} -> {:?}", video_id, target);
        let mut command = Command::new(&self.binary);
        command
            .arg("--format")
            .arg(format_selector(self.max_height))
            .args(["--merge-output-format", "mp4", "--no-progress", "--output"])
            .arg(target)
            .arg(watch_url(video_id));

        run_tool("yt-dlp", &mut command, self.timeout).await?;
        ensure_output("yt-dlp", target).await
    }
}

pub struct FfmpegTranscoder {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    pub fn new(binary: PathBuf, timeout_sec: u64) -> Self {
        Self {
            binary,
            timeout: timeout_from_secs(timeout_sec),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn relocate_index(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        debug!("ffmpeg faststart {:?} -> {:?}", input, output);
        let mut command = Command::new(&self.binary);
        command
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-c", "copy", "-movflags", "+faststart", "-y"])
            .arg(output);

        run_tool("ffmpeg", &mut command, self.timeout).await?;
        ensure_output("ffmpeg", output).await
    }
}
