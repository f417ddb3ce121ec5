use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::services::ServeDir;
use tracing::{error, info};

use super::library_routes::library_routes;
use super::metrics::metrics_handler;
use super::queue_routes::queue_routes;
use super::state::ServerState;
use super::stream_video::stream_video;
use super::websocket::ws_handler;
use super::http_layers::log_requests;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(stats)
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router<ServerState> = queue_routes()
        .nest("/library", library_routes())
        .route("/video/{id}", get(stream_video));

    let home_router: Router<ServerState> = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(home)),
    };

    home_router
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve the API on `state.config.port` and Prometheus metrics on
/// `metrics_port` until `shutdown` resolves.
pub async fn run_server<F>(state: ServerState, metrics_port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    let metrics_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, make_metrics_app()).await {
            error!("Metrics server failed: {}", e);
        }
    });

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    metrics_server.abort();

    result.context("HTTP server failed")
}
