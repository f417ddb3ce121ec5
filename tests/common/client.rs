//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per endpoint. When API routes or request
//! formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Queue Endpoints
    // ========================================================================

    /// GET /api/queue
    pub async fn get_queue(&self) -> Response {
        self.client
            .get(format!("{}/api/queue", self.base_url))
            .send()
            .await
            .expect("Get queue request failed")
    }

    /// GET /api/queue, parsed
    pub async fn queue_state(&self) -> Value {
        self.get_queue()
            .await
            .json()
            .await
            .expect("Queue state is not JSON")
    }

    /// POST /api/queue
    pub async fn add_song(&self, video_id: &str, title: &str) -> Response {
        self.add_song_body(json!({ "videoId": video_id, "title": title }))
            .await
    }

    /// POST /api/queue with an arbitrary body
    pub async fn add_song_body(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api/queue", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Add song request failed")
    }

    /// POST /api/queue, returning the created song's id
    pub async fn add_song_id(&self, video_id: &str, title: &str) -> String {
        let song: Value = self
            .add_song(video_id, title)
            .await
            .json()
            .await
            .expect("Created song is not JSON");
        song["id"]
            .as_str()
            .expect("Created song has no id")
            .to_string()
    }

    /// DELETE /api/queue
    pub async fn clear_queue(&self) -> Response {
        self.client
            .delete(format!("{}/api/queue", self.base_url))
            .send()
            .await
            .expect("Clear queue request failed")
    }

    /// DELETE /api/queue/{id}
    pub async fn remove_song(&self, song_id: &str) -> Response {
        self.client
            .delete(format!("{}/api/queue/{}", self.base_url, song_id))
            .send()
            .await
            .expect("Remove song request failed")
    }

    /// POST /api/queue/reorder
    pub async fn reorder(&self, from_index: i64, to_index: i64) -> Response {
        self.client
            .post(format!("{}/api/queue/reorder", self.base_url))
            .json(&json!({ "fromIndex": from_index, "toIndex": to_index }))
            .send()
            .await
            .expect("Reorder request failed")
    }

    /// POST /api/playback
    pub async fn playback(&self, action: &str) -> Response {
        self.playback_body(json!({ "action": action })).await
    }

    /// POST /api/playback with `play_at`
    pub async fn play_at(&self, index: i64) -> Response {
        self.playback_body(json!({ "action": "play_at", "index": index }))
            .await
    }

    pub async fn playback_body(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api/playback", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Playback request failed")
    }

    // ========================================================================
    // Library Endpoints
    // ========================================================================

    /// GET /api/library/stats
    pub async fn library_stats(&self) -> Response {
        self.client
            .get(format!("{}/api/library/stats", self.base_url))
            .send()
            .await
            .expect("Library stats request failed")
    }

    /// GET /api/library/videos
    pub async fn list_videos(&self) -> Response {
        self.client
            .get(format!("{}/api/library/videos", self.base_url))
            .send()
            .await
            .expect("List videos request failed")
    }

    /// GET /api/library/videos/{id}
    pub async fn get_video(&self, video_id: &str) -> Response {
        self.client
            .get(format!("{}/api/library/videos/{}", self.base_url, video_id))
            .send()
            .await
            .expect("Get video request failed")
    }

    /// POST /api/library/videos/{id}/save
    pub async fn save_video(&self, video_id: &str) -> Response {
        self.client
            .post(format!(
                "{}/api/library/videos/{}/save",
                self.base_url, video_id
            ))
            .send()
            .await
            .expect("Save video request failed")
    }

    // ========================================================================
    // Streaming Endpoints
    // ========================================================================

    /// GET /api/video/{id}?title=
    pub async fn stream_video(&self, video_id: &str, title: &str) -> Response {
        self.client
            .get(format!("{}/api/video/{}", self.base_url, video_id))
            .query(&[("title", title)])
            .send()
            .await
            .expect("Stream video request failed")
    }

    /// HEAD /api/video/{id}
    pub async fn head_video(&self, video_id: &str) -> Response {
        self.client
            .head(format!("{}/api/video/{}", self.base_url, video_id))
            .send()
            .await
            .expect("Head video request failed")
    }

    /// GET /api/video/{id} with Range header
    pub async fn stream_video_with_range(&self, video_id: &str, range: &str) -> Response {
        self.client
            .get(format!("{}/api/video/{}", self.base_url, video_id))
            .header("Range", range)
            .send()
            .await
            .expect("Stream video with range request failed")
    }
}
