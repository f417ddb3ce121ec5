//! WebSocket route handler.
//!
//! Handles WebSocket upgrade, message loop, and cleanup.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{
    connection::ConnectionManager,
    messages::{msg_types, ClientMessage, ServerMessage},
    relay::{BroadcastRelay, RelayHandle},
};
use crate::server::state::{GuardedBroadcastRelay, GuardedConnectionManager};

/// WebSocket upgrade handler for `GET /ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(connection_manager): State<GuardedConnectionManager>,
    State(relay): State<GuardedBroadcastRelay>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, connection_manager, relay))
}

/// Handle an established WebSocket connection.
async fn handle_socket(
    socket: WebSocket,
    connection_manager: Arc<ConnectionManager>,
    relay: Arc<BroadcastRelay>,
) {
    let (connection_id, outgoing_rx) = connection_manager.register().await;
    info!(
        "WebSocket client {} connected ({} total)",
        connection_id,
        connection_manager.total_connections().await
    );

    let (ws_sink, ws_stream) = socket.split();

    // Spawn task to forward outgoing messages to WebSocket
    let outgoing_handle = tokio::spawn(forward_outgoing(ws_sink, outgoing_rx));

    // Starts with the current queue state
    let relay_handle = relay.attach(connection_id);

    process_incoming(ws_stream, connection_id, &connection_manager, &relay_handle).await;

    // Cleanup
    drop(relay_handle);
    outgoing_handle.abort();
    connection_manager.unregister(connection_id).await;
    info!(
        "WebSocket client {} disconnected ({} remaining)",
        connection_id,
        connection_manager.total_connections().await
    );
}

/// Forward messages from the outgoing channel to the WebSocket.
async fn forward_outgoing(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outgoing_rx: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = outgoing_rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to serialize WebSocket message: {}", e);
            }
        }
    }
}

/// Process incoming messages from the WebSocket.
async fn process_incoming(
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    connection_id: usize,
    connection_manager: &ConnectionManager,
    relay_handle: &RelayHandle,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    handle_client_message(connection_id, msg, connection_manager, relay_handle)
                        .await;
                }
                Err(e) => {
                    debug!("Failed to parse client message: {}", e);
                    let error_msg =
                        ServerMessage::error("parse_error", format!("Invalid message format: {}", e));
                    let _ = connection_manager.send_to(connection_id, error_msg).await;
                }
            },
            Ok(Message::Binary(_)) => {
                debug!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                // Axum/tungstenite handles pong automatically
                debug!("Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!("Received pong");
            }
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }
}

/// Handle a parsed client message.
async fn handle_client_message(
    connection_id: usize,
    msg: ClientMessage,
    connection_manager: &ConnectionManager,
    relay_handle: &RelayHandle,
) {
    match msg.msg_type.as_str() {
        msg_types::PING => {
            let pong = ServerMessage::empty(msg_types::PONG);
            let _ = connection_manager.send_to(connection_id, pong).await;
        }
        msg_types::REQUEST_STATE => {
            relay_handle.request_resync();
        }
        other => {
            debug!("Unknown message type: {}", other);
            let error_msg = ServerMessage::error(
                "unknown_type",
                format!("Unknown message type: {}", other),
            );
            let _ = connection_manager.send_to(connection_id, error_msg).await;
        }
    }
}
