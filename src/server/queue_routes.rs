//! Queue and playback HTTP routes.
//!
//! - GET    /api/queue
//! - POST   /api/queue
//! - DELETE /api/queue
//! - DELETE /api/queue/{id}
//! - POST   /api/queue/reorder
//! - POST   /api/playback

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api_error::ApiError;
use crate::queue::{Song, SongRequest};
use crate::server::state::{GuardedQueueManager, ServerState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderBody {
    pub from_index: usize,
    pub to_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackBody {
    pub action: String,
    #[serde(default)]
    pub index: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PlaybackResponse {
    pub success: bool,
    pub song: Option<Song>,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn get_queue(State(queue): State<GuardedQueueManager>) -> impl IntoResponse {
    Json(queue.snapshot())
}

async fn add_song(
    State(queue): State<GuardedQueueManager>,
    Json(body): Json<SongRequest>,
) -> Response {
    if body.video_id.trim().is_empty() || body.title.trim().is_empty() {
        return ApiError::bad_request("videoId and title are required").into_response();
    }
    Json(queue.enqueue(body)).into_response()
}

async fn clear_queue(State(queue): State<GuardedQueueManager>) -> impl IntoResponse {
    queue.clear();
    Json(SuccessResponse { success: true })
}

async fn remove_song(
    State(queue): State<GuardedQueueManager>,
    Path(id): Path<String>,
) -> Response {
    match queue.remove_by_id(&id) {
        Some(song) => Json(PlaybackResponse {
            success: true,
            song: Some(song),
        })
        .into_response(),
        None => ApiError::not_found(format!("Song not in queue: {}", id)).into_response(),
    }
}

async fn reorder_queue(
    State(queue): State<GuardedQueueManager>,
    Json(body): Json<ReorderBody>,
) -> Response {
    if queue.reorder(body.from_index, body.to_index) {
        Json(queue.snapshot()).into_response()
    } else {
        ApiError::bad_request(format!(
            "Index out of range: {} -> {}",
            body.from_index, body.to_index
        ))
        .into_response()
    }
}

async fn playback(
    State(queue): State<GuardedQueueManager>,
    Json(body): Json<PlaybackBody>,
) -> Response {
    debug!("Playback action {} (index {:?})", body.action, body.index);

    let song = match body.action.as_str() {
        "next" => queue.advance(),
        "previous" => queue.retreat(),
        "play" => {
            queue.set_playing(true);
            queue.current_song()
        }
        "pause" => {
            queue.set_playing(false);
            queue.current_song()
        }
        "play_at" => {
            let Some(index) = body.index else {
                return ApiError::bad_request("play_at requires an index").into_response();
            };
            usize::try_from(index)
                .ok()
                .and_then(|index| queue.jump_to(index))
        }
        "complete" => queue.complete_current_and_advance(),
        other => {
            return ApiError::bad_request(format!("Invalid action: {}", other)).into_response()
        }
    };

    Json(PlaybackResponse {
        success: true,
        song,
    })
    .into_response()
}

pub fn queue_routes() -> Router<ServerState> {
    Router::new()
        .route("/queue", post(add_song).get(get_queue).delete(clear_queue))
        .route("/queue/reorder", post(reorder_queue))
        .route("/queue/{id}", delete(remove_song))
        .route("/playback", post(playback))
}
