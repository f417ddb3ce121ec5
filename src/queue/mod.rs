mod manager;
mod models;

pub use manager::{QueueManager, EVENT_CHANNEL_CAPACITY};
pub use models::{QueueEvent, QueueSnapshot, Song, SongRequest};
