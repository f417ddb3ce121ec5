use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use karaoke_server::config;
use karaoke_server::library::{FfmpegTranscoder, VideoLibrary, YtDlpDownloader};
use karaoke_server::queue::QueueManager;
use karaoke_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the video stores and the metadata ledger.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_path)]
    pub library_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// yt-dlp executable, looked up on PATH by default.
    #[clap(long)]
    pub yt_dlp_path: Option<PathBuf>,

    /// ffmpeg executable, looked up on PATH by default.
    #[clap(long)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Timeout in seconds for each yt-dlp/ffmpeg run. 0 disables it.
    #[clap(long, default_value_t = 600)]
    pub tool_timeout_sec: u64,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            library_dir: args.library_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            yt_dlp_path: args.yt_dlp_path.clone(),
            ffmpeg_path: args.ffmpeg_path.clone(),
            tool_timeout_sec: args.tool_timeout_sec,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, initiating graceful shutdown");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  library_dir: {:?}", app_config.library_dir);
    info!("  temp store: {:?}", app_config.library.temp_path);
    info!("  saved store: {:?}", app_config.library.saved_path);
    info!(
        "  auto-save after {} plays, keeping {} temporary videos",
        app_config.library.auto_save_threshold, app_config.library.max_temp_videos
    );

    info!("Initializing metrics...");
    metrics::init_metrics();

    let downloader = Arc::new(YtDlpDownloader::new(
        app_config.yt_dlp_path.clone(),
        app_config.library.max_video_height,
        app_config.tool_timeout_sec,
    ));
    let transcoder = Arc::new(FfmpegTranscoder::new(
        app_config.ffmpeg_path.clone(),
        app_config.tool_timeout_sec,
    ));
    let library = VideoLibrary::open(app_config.library.clone(), downloader, transcoder)
        .context("Failed to open video library")?;
    info!("Library stats: {:?}", library.stats());

    let state = ServerState::new(
        ServerConfig {
            requests_logging_level: app_config.logging_level.clone(),
            port: app_config.port,
            frontend_dir_path: app_config.frontend_dir_path.clone(),
        },
        Arc::new(library),
        Arc::new(QueueManager::new()),
    );

    run_server(state, app_config.metrics_port, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}
