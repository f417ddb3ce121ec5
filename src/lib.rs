//! Karaoke Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod library;
pub mod queue;
pub mod server;

// Re-export commonly used types for convenience
pub use config::{AppConfig, LibrarySettings};
pub use library::{FetchCoordinator, VideoLibrary};
pub use queue::QueueManager;
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
