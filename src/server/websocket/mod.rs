//! Real-time queue updates for display and remote clients.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod relay;

pub use connection::ConnectionManager;
pub use handler::ws_handler;
pub use messages::{msg_types, ClientMessage, ServerMessage};
pub use relay::{BroadcastRelay, RelayHandle};
