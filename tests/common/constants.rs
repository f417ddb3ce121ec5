//! Shared constants for end-to-end tests
//!
//! When fake media or ids change, update only this file.

// ============================================================================
// Video IDs
// ============================================================================

pub const VIDEO_1_ID: &str = "video-1";
pub const VIDEO_2_ID: &str = "video-2";
pub const VIDEO_3_ID: &str = "video-3";
pub const VIDEO_4_ID: &str = "video-4";

/// Any id with this prefix makes the fake downloader fail.
pub const UNAVAILABLE_PREFIX: &str = "gone";

/// Bytes written by the fake downloader for every video.
pub const FAKE_VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42fake-video-payload-0123456789";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Request timeout for HTTP client (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server readiness (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// How long to wait for an expected WebSocket message (milliseconds)
pub const WS_MESSAGE_TIMEOUT_MS: u64 = 2000;
