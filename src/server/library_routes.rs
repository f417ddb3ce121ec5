//! Video library HTTP routes.
//!
//! - GET  /api/library/stats
//! - GET  /api/library/videos
//! - GET  /api/library/videos/{id}
//! - POST /api/library/videos/{id}/save

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use super::api_error::ApiError;
use crate::library::VideoRecord;
use crate::server::state::{GuardedVideoLibrary, ServerState};

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub video: Option<VideoRecord>,
}

async fn get_stats(State(library): State<GuardedVideoLibrary>) -> impl IntoResponse {
    Json(library.stats())
}

async fn list_videos(State(library): State<GuardedVideoLibrary>) -> impl IntoResponse {
    Json(library.list_all())
}

async fn get_video(
    State(library): State<GuardedVideoLibrary>,
    Path(id): Path<String>,
) -> Response {
    match library.video_info(&id) {
        Some(record) => Json(record).into_response(),
        None => ApiError::not_found(format!("Video not found: {}", id)).into_response(),
    }
}

async fn save_video(
    State(library): State<GuardedVideoLibrary>,
    Path(id): Path<String>,
) -> Response {
    match library.promote_to_saved(&id) {
        Ok(success) => {
            info!("Save requested for {}: {}", id, success);
            Json(SaveResponse {
                success,
                video: library.video_info(&id),
            })
            .into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub fn library_routes() -> Router<ServerState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/videos", get(list_videos))
        .route("/videos/{id}", get(get_video))
        .route("/videos/{id}/save", post(save_video))
}
