//! Video streaming with byte-range support.

use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::api_error::ApiError;
use super::state::GuardedFetchCoordinator;

const STREAM_BUFFER_SIZE: usize = 4096 * 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start_inclusive: Option<u64>,
    end_inclusive: Option<u64>,
}

impl ByteRange {
    pub fn new(start_inclusive: Option<u64>, end_inclusive: Option<u64>) -> ByteRange {
        ByteRange {
            start_inclusive,
            end_inclusive,
        }
    }

    /// Parse a single-range `Range` header value. `bytes=-` carries no range.
    fn parse<S: AsRef<str>>(s: S) -> Option<ByteRange> {
        let v = s.as_ref().strip_prefix("bytes=")?;
        let (start, end) = v.split_once('-')?;
        if end.contains('-') {
            return None;
        }

        let range = ByteRange {
            start_inclusive: start.trim().parse::<u64>().ok(),
            end_inclusive: end.trim().parse::<u64>().ok(),
        };
        if range.start_inclusive.is_none() && range.end_inclusive.is_none() {
            return None;
        }
        Some(range)
    }

    fn from_headers(headers: &HeaderMap) -> Option<ByteRange> {
        headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(ByteRange::parse)
    }

    /// Whether a player asking for this range is starting from the top.
    fn is_from_start(&self) -> bool {
        self.start_inclusive == Some(0)
    }

    /// Inclusive `(first, last)` byte positions within a file of
    /// `file_length` bytes, or `None` when the range cannot be satisfied.
    fn resolve(&self, file_length: u64) -> Option<(u64, u64)> {
        if file_length == 0 {
            return None;
        }
        let last_byte = file_length - 1;
        match (self.start_inclusive, self.end_inclusive) {
            (Some(start), None) if start <= last_byte => Some((start, last_byte)),
            (Some(start), Some(end)) if start <= end && start <= last_byte => {
                Some((start, end.min(last_byte)))
            }
            // Suffix range: the last `n` bytes.
            (None, Some(n)) if n > 0 => Some((file_length - n.min(file_length), last_byte)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub title: Option<String>,
}

/// `GET /api/video/{id}`: serve the local copy, downloading it first when
/// needed, and count the play. `HEAD` is answered the same way but never
/// counts.
pub async fn stream_video(
    method: Method,
    State(fetcher): State<GuardedFetchCoordinator>,
    Path(video_id): Path<String>,
    Query(query): Query<VideoQuery>,
    headers: HeaderMap,
) -> Response {
    let byte_range = ByteRange::from_headers(&headers);
    let title = query
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let path = match fetcher.get_or_fetch(&video_id, &title).await {
        Ok(path) => path,
        Err(e) => return ApiError::from(e.as_ref()).into_response(),
    };

    let library = fetcher.library();
    // Seeks and continuation chunks are not new plays.
    if method == Method::GET && byte_range.map(|r| r.is_from_start()).unwrap_or(true) {
        if let Err(e) = library.record_play(&video_id) {
            warn!("Failed to record play of {}: {}", video_id, e);
        }
    }

    // Recording a play may have moved the file into the saved store.
    let path = library.resolve_path(&video_id).unwrap_or(path);
    debug!("Streaming video {} from {}", video_id, path.display());

    serve_file(&path, byte_range).await
}

async fn serve_file(path: &FsPath, byte_range: Option<ByteRange>) -> Response {
    let mut file = match File::open(path).await {
        Ok(x) => x,
        Err(e) => {
            warn!("Failed to open {}: {}", path.display(), e);
            return ApiError::not_found("Video file is no longer available").into_response();
        }
    };

    let file_length = match file.metadata().await {
        Ok(x) => x.len(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let (status_code, start, length) = match byte_range {
        None => {
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=31536000"),
            );
            (StatusCode::OK, 0, file_length)
        }
        Some(range) => match range.resolve(file_length) {
            Some((start, end)) => {
                if let Ok(value) =
                    HeaderValue::from_str(&format!("bytes {}-{}/{}", start, end, file_length))
                {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                (StatusCode::PARTIAL_CONTENT, start, end - start + 1)
            }
            None => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", file_length)) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                return (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response();
            }
        },
    };

    if start > 0 && file.seek(SeekFrom::Start(start)).await.is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    let file_reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, file).take(length);
    let stream = ReaderStream::with_capacity(file_reader, STREAM_BUFFER_SIZE);

    (status_code, headers, Body::from_stream(stream)).into_response()
}
