use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One queued song. Copies handed out are snapshots; the queue owns the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub video_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by: Option<String>,
    /// Epoch milliseconds.
    pub added_at: i64,
}

/// What a caller supplies to enqueue a song; id and timestamp are assigned by the queue.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRequest {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub added_by: Option<String>,
}

impl SongRequest {
    pub fn new(video_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Immutable view of the queue as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub songs: Vec<Song>,
    /// -1 when there is no current song.
    pub current_index: i64,
    pub is_playing: bool,
}

impl QueueSnapshot {
    pub fn current_song(&self) -> Option<&Song> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|i| self.songs.get(i))
    }
}

/// Change notifications published by the queue, in mutation order.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Update(QueueSnapshot),
    SongAdded(Song),
    SongRemoved(Song),
    CurrentChanged(Song),
    PlaybackState(bool),
}

impl QueueEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::Update(_) => "queue_update",
            QueueEvent::SongAdded(_) => "song_added",
            QueueEvent::SongRemoved(_) => "song_removed",
            QueueEvent::CurrentChanged(_) => "current_changed",
            QueueEvent::PlaybackState(_) => "playback_state",
        }
    }

    pub fn payload(&self) -> Value {
        let result = match self {
            QueueEvent::Update(snapshot) => serde_json::to_value(snapshot),
            QueueEvent::SongAdded(song)
            | QueueEvent::SongRemoved(song)
            | QueueEvent::CurrentChanged(song) => serde_json::to_value(song),
            QueueEvent::PlaybackState(playing) => Ok(Value::Bool(*playing)),
        };
        result.unwrap_or(Value::Null)
    }
}
