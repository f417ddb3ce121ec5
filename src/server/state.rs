use axum::extract::FromRef;

use crate::library::{FetchCoordinator, VideoLibrary};
use crate::queue::QueueManager;
use std::sync::Arc;
use std::time::Instant;

use super::websocket::{BroadcastRelay, ConnectionManager};
use super::ServerConfig;

pub type GuardedVideoLibrary = Arc<VideoLibrary>;
pub type GuardedFetchCoordinator = Arc<FetchCoordinator>;
pub type GuardedQueueManager = Arc<QueueManager>;
pub type GuardedConnectionManager = Arc<ConnectionManager>;
pub type GuardedBroadcastRelay = Arc<BroadcastRelay>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub library: GuardedVideoLibrary,
    pub fetcher: GuardedFetchCoordinator,
    pub queue: GuardedQueueManager,
    pub ws_connection_manager: GuardedConnectionManager,
    pub relay: GuardedBroadcastRelay,
}

impl ServerState {
    /// Wire the shared components together. Built once per process.
    pub fn new(config: ServerConfig, library: GuardedVideoLibrary, queue: GuardedQueueManager) -> Self {
        let ws_connection_manager = Arc::new(ConnectionManager::new());
        let relay = Arc::new(BroadcastRelay::new(
            queue.clone(),
            ws_connection_manager.clone(),
        ));
        Self {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_string(),
            fetcher: Arc::new(FetchCoordinator::new(library.clone())),
            library,
            queue,
            ws_connection_manager,
            relay,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedVideoLibrary {
    fn from_ref(input: &ServerState) -> Self {
        input.library.clone()
    }
}

impl FromRef<ServerState> for GuardedFetchCoordinator {
    fn from_ref(input: &ServerState) -> Self {
        input.fetcher.clone()
    }
}

impl FromRef<ServerState> for GuardedQueueManager {
    fn from_ref(input: &ServerState) -> Self {
        input.queue.clone()
    }
}

impl FromRef<ServerState> for GuardedConnectionManager {
    fn from_ref(input: &ServerState) -> Self {
        input.ws_connection_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedBroadcastRelay {
    fn from_ref(input: &ServerState) -> Self {
        input.relay.clone()
    }
}
