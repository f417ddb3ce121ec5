mod file_config;

pub use file_config::{FileConfig, LibraryConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};

pub const DEFAULT_AUTO_SAVE_THRESHOLD: u64 = 5;
pub const DEFAULT_MAX_TEMP_VIDEOS: usize = 3;
pub const DEFAULT_MAX_VIDEO_HEIGHT: u32 = 1080;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub library_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub yt_dlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub tool_timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub library_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // External tools
    pub yt_dlp_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub tool_timeout_sec: u64,

    pub library: LibrarySettings,
}

/// Storage layout and cache policy for the video library.
#[derive(Debug, Clone, PartialEq)]
pub struct LibrarySettings {
    pub temp_path: PathBuf,
    pub saved_path: PathBuf,
    pub metadata_file: PathBuf,
    /// Plays after which an unsaved video is promoted automatically.
    pub auto_save_threshold: u64,
    /// Temporary videos kept materialized before eviction kicks in.
    pub max_temp_videos: usize,
    pub max_video_height: u32,
}

impl LibrarySettings {
    /// Default layout rooted at `library_dir`.
    pub fn with_root(library_dir: &Path) -> Self {
        let temp_path = library_dir.join("youtube");
        Self {
            saved_path: temp_path.join("saved"),
            temp_path,
            metadata_file: library_dir.join("metadata.json"),
            auto_save_threshold: DEFAULT_AUTO_SAVE_THRESHOLD,
            max_temp_videos: DEFAULT_MAX_TEMP_VIDEOS,
            max_video_height: DEFAULT_MAX_VIDEO_HEIGHT,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let library_dir = file
            .library_dir
            .map(PathBuf::from)
            .or_else(|| cli.library_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("library_dir must be specified via --library-dir or in config file")
            })?;

        if library_dir.exists() && !library_dir.is_dir() {
            bail!("library_dir is not a directory: {:?}", library_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let yt_dlp_path = file
            .yt_dlp_path
            .map(PathBuf::from)
            .or_else(|| cli.yt_dlp_path.clone())
            .unwrap_or_else(|| PathBuf::from("yt-dlp"));
        let ffmpeg_path = file
            .ffmpeg_path
            .map(PathBuf::from)
            .or_else(|| cli.ffmpeg_path.clone())
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let tool_timeout_sec = file.tool_timeout_sec.unwrap_or(cli.tool_timeout_sec);

        // Library settings - merge file config with defaults
        let defaults = LibrarySettings::with_root(&library_dir);
        let lib_file = file.library.unwrap_or_default();
        let library = LibrarySettings {
            temp_path: lib_file
                .temp_path
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_path),
            saved_path: lib_file
                .saved_path
                .map(PathBuf::from)
                .unwrap_or(defaults.saved_path),
            metadata_file: lib_file
                .metadata_file
                .map(PathBuf::from)
                .unwrap_or(defaults.metadata_file),
            auto_save_threshold: lib_file
                .auto_save_threshold
                .unwrap_or(defaults.auto_save_threshold),
            max_temp_videos: lib_file
                .max_temp_videos
                .unwrap_or(defaults.max_temp_videos),
            max_video_height: lib_file
                .max_video_height
                .unwrap_or(defaults.max_video_height),
        };

        if library.auto_save_threshold == 0 {
            bail!("library.auto_save_threshold must be at least 1");
        }
        if library.max_temp_videos == 0 {
            bail!("library.max_temp_videos must be at least 1");
        }
        if library.temp_path == library.saved_path {
            bail!(
                "library temp_path and saved_path must differ: {:?}",
                library.temp_path
            );
        }

        Ok(Self {
            library_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            yt_dlp_path,
            ffmpeg_path,
            tool_timeout_sec,
            library,
        })
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
