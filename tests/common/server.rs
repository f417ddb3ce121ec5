//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own library directory and queue.

use super::constants::*;
use super::fixtures::{FakeDownloader, FakeTranscoder};
use karaoke_server::config::LibrarySettings;
use karaoke_server::library::VideoLibrary;
use karaoke_server::queue::QueueManager;
use karaoke_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated library
///
/// When dropped, the server gracefully shuts down and the temp directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Shared library, for asserting on ledger state directly
    pub library: Arc<VideoLibrary>,

    /// Shared queue, for mutating it without going through HTTP
    pub queue: Arc<QueueManager>,

    pub library_dir: PathBuf,

    downloads: Arc<AtomicUsize>,
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port with default library settings
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawns a test server after letting the caller adjust library settings
    pub async fn spawn_with<F>(configure: F) -> Self
    where
        F: FnOnce(&mut LibrarySettings),
    {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let library_dir = temp_dir.path().to_path_buf();

        let mut settings = LibrarySettings::with_root(&library_dir);
        configure(&mut settings);

        let downloads = Arc::new(AtomicUsize::new(0));
        let library = Arc::new(
            VideoLibrary::open(
                settings,
                Arc::new(FakeDownloader {
                    downloads: downloads.clone(),
                }),
                Arc::new(FakeTranscoder),
            )
            .expect("Failed to open library"),
        );
        let queue = Arc::new(QueueManager::new());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };
        let app = make_app(ServerState::new(config, library.clone(), queue.clone()));

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            library,
            queue,
            library_dir,
            downloads,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Number of times the fake downloader has been invoked
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    /// Waits for the server to become ready by polling the status endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
