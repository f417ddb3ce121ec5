mod fetch_coordinator;
mod ledger;
pub mod media_tools;
mod models;
mod video_library;

pub use fetch_coordinator::{FetchCoordinator, FetchResult};
pub use ledger::Ledger;
pub use media_tools::{Downloader, FfmpegTranscoder, ToolError, Transcoder, YtDlpDownloader};
pub use models::{LibraryStats, StorageLocation, VideoListing, VideoRecord};
pub use video_library::{LibraryError, VideoLibrary};
