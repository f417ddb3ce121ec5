mod api_error;
pub mod config;
mod http_layers;
mod library_routes;
pub mod metrics;
mod queue_routes;
pub mod server;
pub mod state;
mod stream_video;
pub mod websocket;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::ServerState;
