//! WebSocket connection manager.
//!
//! Tracks every live connection by a process-unique id and hands out the
//! receiving end of its outgoing message channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, RwLock};

use super::messages::ServerMessage;
use crate::server::metrics;

/// Outgoing messages buffered per connection.
const OUTGOING_CHANNEL_SIZE: usize = 32;

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SendError {
    /// The target connection is not registered.
    NotConnected,
    /// The connection channel is closed (client went away).
    Disconnected,
}

pub struct ConnectionManager {
    next_id: AtomicUsize,
    /// connection_id -> outgoing sender
    connections: RwLock<HashMap<usize, mpsc::Sender<ServerMessage>>>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns its id and a receiver for outgoing messages; the caller
    /// forwards messages from the receiver to the socket.
    pub async fn register(&self) -> (usize, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(OUTGOING_CHANNEL_SIZE);
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut conns = self.connections.write().await;
        conns.insert(connection_id, tx);
        metrics::set_ws_connections(conns.len());

        (connection_id, rx)
    }

    /// Unregister a connection (called on disconnect).
    pub async fn unregister(&self, connection_id: usize) {
        let mut conns = self.connections.write().await;
        conns.remove(&connection_id);
        metrics::set_ws_connections(conns.len());
    }

    /// Send a message to one connection, waiting for buffer space.
    pub async fn send_to(
        &self,
        connection_id: usize,
        message: ServerMessage,
    ) -> Result<(), SendError> {
        // Clone the sender so a slow client does not hold the map lock.
        let sender = {
            let conns = self.connections.read().await;
            conns
                .get(&connection_id)
                .cloned()
                .ok_or(SendError::NotConnected)?
        };
        sender
            .send(message)
            .await
            .map_err(|_| SendError::Disconnected)
    }

    #[cfg(test)]
    async fn is_connected(&self, connection_id: usize) -> bool {
        self.connections.read().await.contains_key(&connection_id)
    }

    pub async fn total_connections(&self) -> usize {
        self.connections.read().await.len()
    }
}
