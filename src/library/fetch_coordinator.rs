//! Collapses concurrent fetches of the same video into a single download.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info};

use super::video_library::{LibraryError, VideoLibrary};
use crate::server::metrics;

pub type FetchResult = Result<PathBuf, Arc<LibraryError>>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type InFlight = Arc<Mutex<HashMap<String, SharedFetch>>>;

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<String, SharedFetch>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Serves local files when present and otherwise runs at most one fetch per
/// video id at a time. Every concurrent caller for the same id observes the
/// same outcome.
///
/// Fetches run on their own task, so a caller going away does not cancel a
/// download that other callers (or the next request) will want.
pub struct FetchCoordinator {
    library: Arc<VideoLibrary>,
    in_flight: InFlight,
}

impl FetchCoordinator {
    pub fn new(library: Arc<VideoLibrary>) -> Self {
        Self {
            library,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn library(&self) -> &Arc<VideoLibrary> {
        &self.library
    }

    #[cfg(test)]
    fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Local path of `video_id`, downloading it first if needed.
    pub async fn get_or_fetch(&self, video_id: &str, title: &str) -> FetchResult {
        if let Some(path) = self.library.resolve_path(video_id) {
            metrics::record_library_fetch("hit");
            return Ok(path);
        }

        let fetch = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(video_id) {
                Some(existing) => {
                    debug!("Joining in-flight fetch of {}", video_id);
                    existing.clone()
                }
                None => {
                    info!("Starting fetch of {}", video_id);
                    let fetch = self.spawn_fetch(video_id, title);
                    in_flight.insert(video_id.to_string(), fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    // Called with the in-flight lock held; the spawned task takes the same
    // lock to remove its entry, so it cannot run ahead of the insertion.
    fn spawn_fetch(&self, video_id: &str, title: &str) -> SharedFetch {
        let library = self.library.clone();
        let in_flight = self.in_flight.clone();
        let id = video_id.to_string();
        let title = title.to_string();

        let handle = tokio::spawn(async move {
            let result = library
                .fetch_and_materialize(&id, &title)
                .await
                .map_err(Arc::new);
            lock(&in_flight).remove(&id);
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(Arc::new(LibraryError::Io(std::io::Error::other(
                    join_error.to_string(),
                )))),
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibrarySettings;
    use crate::library::media_tools::{Downloader, ToolError, Transcoder};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct SlowDownloader {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Downloader for SlowDownloader {
        async fn download(&self, _video_id: &str, target: &Path) -> Result<(), ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            if self.fail {
                return Err(ToolError::NonZeroExit {
                    tool: "fake".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: String::new(),
                });
            }
            tokio::fs::write(target, b"video").await.unwrap();
            Ok(())
        }
    }

    struct CopyTranscoder;

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        async fn relocate_index(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
            tokio::fs::copy(input, output).await.unwrap();
            Ok(())
        }
    }

    fn coordinator(dir: &TempDir, fail: bool) -> (FetchCoordinator, Arc<SlowDownloader>) {
        let settings = LibrarySettings::with_root(dir.path());
        let downloader = Arc::new(SlowDownloader {
            calls: AtomicUsize::new(0),
            fail,
        });
        let library =
            VideoLibrary::open(settings, downloader.clone(), Arc::new(CopyTranscoder)).unwrap();
        (FetchCoordinator::new(Arc::new(library)), downloader)
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_download() {
        let dir = TempDir::new().unwrap();
        let (coordinator, downloader) = coordinator(&dir, false);

        let (a, b, c) = tokio::join!(
            coordinator.get_or_fetch("abc", "ABC"),
            coordinator.get_or_fetch("abc", "ABC"),
            coordinator.get_or_fetch("abc", "ABC"),
        );

        let path = a.unwrap();
        assert_eq!(b.unwrap(), path);
        assert_eq!(c.unwrap(), path);
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn local_hit_skips_download() {
        let dir = TempDir::new().unwrap();
        let (coordinator, downloader) = coordinator(&dir, false);

        coordinator.get_or_fetch("abc", "ABC").await.unwrap();
        coordinator.get_or_fetch("abc", "ABC").await.unwrap();

        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_shared_and_then_retried() {
        let dir = TempDir::new().unwrap();
        let (coordinator, downloader) = coordinator(&dir, true);

        let (a, b) = tokio::join!(
            coordinator.get_or_fetch("abc", "ABC"),
            coordinator.get_or_fetch("abc", "ABC"),
        );
        assert!(matches!(a.unwrap_err().as_ref(), LibraryError::Fetch { .. }));
        assert!(b.is_err());
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);

        // The settled entry is gone, so the next request starts over.
        assert!(coordinator.get_or_fetch("abc", "ABC").await.is_err());
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 2);
    }
}
