//! WebSocket message types.
//!
//! Both directions share one envelope: `{ "type": <name>, "payload": <json> }`.

use serde::{Deserialize, Serialize};

use crate::queue::{QueueEvent, QueueSnapshot};

/// Server -> Client message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    /// Message type identifier (e.g. "queue_update", "pong")
    #[serde(rename = "type")]
    pub msg_type: String,
    pub payload: serde_json::Value,
}

impl ServerMessage {
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Create a server message with a null payload.
    pub fn empty(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::Value::Null,
        }
    }

    /// Full-state message sent on connect, on request and after a resync.
    pub fn queue_state(snapshot: &QueueSnapshot) -> Self {
        Self::new(msg_types::QUEUE_UPDATE, snapshot)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(msg_types::ERROR, system::Error::new(code, message))
    }
}

impl From<&QueueEvent> for ServerMessage {
    fn from(event: &QueueEvent) -> Self {
        Self {
            msg_type: event.name().to_string(),
            payload: event.payload(),
        }
    }
}

/// Client -> Server message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// System-level payloads.
pub mod system {
    use serde::{Deserialize, Serialize};

    /// Error message (server -> client), sent in reply to a message the
    /// server could not handle.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Error {
        pub code: String,
        pub message: String,
    }

    impl Error {
        pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
            Self {
                code: code.into(),
                message: message.into(),
            }
        }
    }
}

/// Reserved message type constants.
pub mod msg_types {
    /// Client heartbeat request.
    pub const PING: &str = "ping";
    /// Server heartbeat response.
    pub const PONG: &str = "pong";
    /// Client asks for a fresh queue snapshot.
    pub const REQUEST_STATE: &str = "request_state";
    /// Server error response.
    pub const ERROR: &str = "error";
    /// Full queue state (server -> client).
    pub const QUEUE_UPDATE: &str = "queue_update";
    pub const SONG_ADDED: &str = "song_added";
    pub const SONG_REMOVED: &str = "song_removed";
    pub const CURRENT_CHANGED: &str = "current_changed";
    pub const PLAYBACK_STATE: &str = "playback_state";
}
