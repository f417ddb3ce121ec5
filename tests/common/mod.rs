//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, VIDEO_1_ID};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_stream_video() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.stream_video(VIDEO_1_ID, "Song").await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;
mod ws;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
#[allow(unused_imports)]
pub use ws::{connect_ws, expect_silence, next_message, send_json, wait_for_message, WsStream};
