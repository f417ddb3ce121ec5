//! Fans queue events out to WebSocket clients.
//!
//! Each attached connection gets its own forwarding task with its own
//! subscription to the queue. A subscription always starts from a snapshot
//! taken atomically with it, so a client never sees an event older than the
//! state it was last synced to. A forwarder that falls behind, or a client
//! that asks for the state, starts over from a fresh snapshot.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::connection::ConnectionManager;
use super::messages::ServerMessage;
use crate::queue::{QueueEvent, QueueManager};
use crate::server::metrics;

pub struct BroadcastRelay {
    queue: Arc<QueueManager>,
    connections: Arc<ConnectionManager>,
}

/// Forwarding task of one connection. Dropping it stops the task.
pub struct RelayHandle {
    resync: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    /// Ask for the current queue state to be pushed to this connection.
    pub fn request_resync(&self) {
        // A full channel means a resync is already pending.
        let _ = self.resync.try_send(());
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl BroadcastRelay {
    pub fn new(queue: Arc<QueueManager>, connections: Arc<ConnectionManager>) -> Self {
        Self { queue, connections }
    }

    /// Start forwarding to `connection_id`. The first message it receives is
    /// the current queue state.
    pub fn attach(&self, connection_id: usize) -> RelayHandle {
        let (resync, resync_rx) = mpsc::channel(1);
        let task = tokio::spawn(forward_events(
            self.queue.clone(),
            self.connections.clone(),
            connection_id,
            resync_rx,
        ));
        RelayHandle { resync, task }
    }
}

/// Resubscribe and push the snapshot. Returns `None` once the client is gone.
async fn sync(
    queue: &QueueManager,
    connections: &ConnectionManager,
    connection_id: usize,
) -> Option<broadcast::Receiver<QueueEvent>> {
    let (snapshot, events) = queue.subscribe_with_snapshot();
    connections
        .send_to(connection_id, ServerMessage::queue_state(&snapshot))
        .await
        .ok()?;
    Some(events)
}

async fn forward_events(
    queue: Arc<QueueManager>,
    connections: Arc<ConnectionManager>,
    connection_id: usize,
    mut resync_rx: mpsc::Receiver<()>,
) {
    let Some(mut events) = sync(&queue, &connections, connection_id).await else {
        return;
    };

    loop {
        tokio::select! {
            Some(()) = resync_rx.recv() => {
                debug!("Resync requested by connection {}", connection_id);
                match sync(&queue, &connections, connection_id).await {
                    Some(fresh) => events = fresh,
                    None => break,
                }
            }
            event_result = events.recv() => {
                match event_result {
                    Ok(event) => {
                        if connections
                            .send_to(connection_id, ServerMessage::from(&event))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(
                            "Connection {} lagged by {} queue events, resyncing",
                            connection_id, n
                        );
                        metrics::record_ws_resync();
                        match sync(&queue, &connections, connection_id).await {
                            Some(fresh) => events = fresh,
                            None => break,
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Queue event channel closed");
                        break;
                    }
                }
            }
        }
    }

    debug!("Relay for connection {} stopped", connection_id);
}
