//! Play queue state machine.
//!
//! Every mutation runs under one lock and publishes its events before the
//! lock is released, so subscribers observe events in mutation order and
//! every `queue_update` carries a snapshot in which the cursor is valid.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{QueueEvent, QueueSnapshot, Song, SongRequest};
use crate::server::metrics;

/// Events buffered per subscriber before it starts lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct QueueState {
    songs: Vec<Song>,
    current: Option<usize>,
    is_playing: bool,
}

impl QueueState {
    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            songs: self.songs.clone(),
            current_index: self.current.map(|i| i as i64).unwrap_or(-1),
            is_playing: self.is_playing,
        }
    }

    fn current_song(&self) -> Option<&Song> {
        self.current.and_then(|i| self.songs.get(i))
    }
}

pub struct QueueManager {
    state: Mutex<QueueState>,
    events: broadcast::Sender<QueueEvent>,
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueManager {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(QueueState::default()),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Current state plus a receiver for every event after it, taken
    /// atomically so no event is missed or seen twice.
    pub fn subscribe_with_snapshot(&self) -> (QueueSnapshot, broadcast::Receiver<QueueEvent>) {
        let state = self.state();
        (state.snapshot(), self.events.subscribe())
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.state().snapshot()
    }

    pub fn current_song(&self) -> Option<Song> {
        self.state().current_song().cloned()
    }

    /// Publish one `queue_update` followed by the operation-specific events.
    fn notify(&self, state: &QueueState, extra: impl IntoIterator<Item = QueueEvent>) {
        metrics::set_queue_length(state.songs.len());
        // Sending only fails when nobody is subscribed.
        let _ = self.events.send(QueueEvent::Update(state.snapshot()));
        for event in extra {
            let _ = self.events.send(event);
        }
    }

    pub fn enqueue(&self, request: SongRequest) -> Song {
        let song = Song {
            id: Uuid::new_v4().to_string(),
            video_id: request.video_id,
            title: request.title,
            channel_title: request.channel_title,
            thumbnail: request.thumbnail,
            added_by: request.added_by,
            added_at: chrono::Utc::now().timestamp_millis(),
        };

        let mut state = self.state();
        state.songs.push(song.clone());
        info!(
            "Queued \"{}\" ({} songs, current {:?})",
            song.title,
            state.songs.len(),
            state.current
        );
        self.notify(&state, [QueueEvent::SongAdded(song.clone())]);
        song
    }

    /// Remove the song with `id`. A removal at or before the cursor moves the
    /// cursor back by one, which leaves it at -1 when the first song was current.
    pub fn remove_by_id(&self, id: &str) -> Option<Song> {
        let mut state = self.state();
        let index = state.songs.iter().position(|s| s.id == id)?;
        let removed = state.songs.remove(index);

        if let Some(current) = state.current {
            if index <= current {
                state.current = current.checked_sub(1);
            }
        }

        info!("Removed \"{}\" from position {}", removed.title, index);
        self.notify(&state, [QueueEvent::SongRemoved(removed.clone())]);
        Some(removed)
    }

    fn move_to(&self, state: &mut QueueState, index: usize) -> Song {
        state.current = Some(index);
        state.is_playing = true;
        let song = state.songs[index].clone();
        debug!("Cursor moved to {} (\"{}\")", index, song.title);
        self.notify(state, [QueueEvent::CurrentChanged(song.clone())]);
        song
    }

    pub fn advance(&self) -> Option<Song> {
        let mut state = self.state();
        let next = state.current.map(|c| c + 1).unwrap_or(0);
        if next >= state.songs.len() {
            return None;
        }
        Some(self.move_to(&mut state, next))
    }

    pub fn retreat(&self) -> Option<Song> {
        let mut state = self.state();
        let previous = state.current?.checked_sub(1)?;
        Some(self.move_to(&mut state, previous))
    }

    pub fn jump_to(&self, index: usize) -> Option<Song> {
        let mut state = self.state();
        if index >= state.songs.len() {
            return None;
        }
        Some(self.move_to(&mut state, index))
    }

    pub fn set_playing(&self, playing: bool) {
        let mut state = self.state();
        state.is_playing = playing;
        self.notify(&state, [QueueEvent::PlaybackState(playing)]);
    }

    /// Drop the song that just finished. The cursor keeps its position, which
    /// now holds the following song; past the end the queue goes idle.
    pub fn complete_current_and_advance(&self) -> Option<Song> {
        let mut state = self.state();
        let Some(current) = state.current.filter(|&c| c < state.songs.len()) else {
            debug!("Nothing playing, ignoring completion");
            return None;
        };

        let finished = state.songs.remove(current);
        if current >= state.songs.len() {
            state.current = None;
            state.is_playing = false;
            info!("Finished \"{}\", queue exhausted", finished.title);
        } else {
            info!("Finished \"{}\"", finished.title);
        }

        let next = state.current_song().cloned();
        let mut events = vec![QueueEvent::SongRemoved(finished)];
        if let Some(song) = &next {
            events.push(QueueEvent::CurrentChanged(song.clone()));
        }
        self.notify(&state, events);
        next
    }

    /// Move the song at `from` to `to`, keeping the cursor on the same song.
    pub fn reorder(&self, from: usize, to: usize) -> bool {
        let mut state = self.state();
        let len = state.songs.len();
        if from >= len || to >= len {
            return false;
        }

        let song = state.songs.remove(from);
        state.songs.insert(to, song);

        if let Some(current) = state.current {
            state.current = Some(if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            });
        }

        debug!("Moved song {} -> {}", from, to);
        self.notify(&state, []);
        true
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.songs.clear();
        state.current = None;
        state.is_playing = false;
        info!("Queue cleared");
        self.notify(&state, []);
    }
}
