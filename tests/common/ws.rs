//! WebSocket helpers for end-to-end tests

use super::constants::*;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connect and consume the initial `queue_update` snapshot, returning it.
pub async fn connect_ws(ws_url: &str) -> (WsStream, Value) {
    let (mut ws, _) = connect_async(ws_url)
        .await
        .expect("Failed to connect to WebSocket");

    let snapshot = next_message(&mut ws)
        .await
        .expect("No initial snapshot received");
    assert_eq!(snapshot["type"], "queue_update");

    (ws, snapshot)
}

/// Next JSON text message, or None after the timeout.
pub async fn next_message(ws: &mut WsStream) -> Option<Value> {
    let result = timeout(Duration::from_millis(WS_MESSAGE_TIMEOUT_MS), async {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if let Ok(json) = serde_json::from_str::<Value>(&text) {
                    return Some(json);
                }
            }
        }
        None
    })
    .await;

    result.ok().flatten()
}

/// Skip messages until one of `expected_type` arrives.
pub async fn wait_for_message(ws: &mut WsStream, expected_type: &str) -> Option<Value> {
    let result = timeout(Duration::from_millis(WS_MESSAGE_TIMEOUT_MS), async {
        loop {
            let json = next_message(ws).await?;
            if json["type"] == expected_type {
                return Some(json);
            }
        }
    })
    .await;

    result.ok().flatten()
}

/// True when nothing arrives within `millis`.
pub async fn expect_silence(ws: &mut WsStream, millis: u64) -> bool {
    timeout(Duration::from_millis(millis), ws.next()).await.is_err()
}

pub async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send WebSocket message");
}
