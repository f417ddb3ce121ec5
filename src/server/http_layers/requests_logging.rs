//! Request logging middleware

use super::super::state::ServerState;
use crate::server::metrics::{categorize_endpoint, record_http_request};
use axum::extract::State;
use axum::{
    body::{Body, Bytes},
    http::{header, header::HeaderMap, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

/// What the Body level prints for a request or response.
#[derive(Debug, PartialEq)]
enum BodyLog {
    /// Buffer up to this many bytes and print them.
    Print(usize),
    Skip(String),
}

fn body_log(headers: &HeaderMap) -> BodyLog {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    // Streams can be hundreds of megabytes and are never text.
    if content_type.starts_with("video/") {
        return BodyLog::Skip(format!("{} stream", content_type));
    }

    let Some(value) = headers.get(header::CONTENT_LENGTH) else {
        return BodyLog::Skip("no content-length".to_string());
    };
    match value.to_str().ok().and_then(|s| s.parse::<usize>().ok()) {
        Some(size) if size < MAX_LOGGABLE_BODY_LENGTH => BodyLog::Print(size),
        Some(size) => BodyLog::Skip(format!("too big to log ({:#})", byte_unit::Byte::from(size))),
        None => BodyLog::Skip(format!("unreadable content-length {:?}", value)),
    }
}

fn log_headers(direction: &str, headers: &HeaderMap) {
    info!("  {} headers:", direction);
    for (name, value) in headers.iter() {
        info!("    {}: {:?}", name, value);
    }
}

/// Buffers `body` when it is small enough to print, handing back an
/// equivalent one. `None` means the body could not be read.
async fn log_body(direction: &str, headers: &HeaderMap, body: Body) -> Option<Body> {
    match body_log(headers) {
        BodyLog::Skip(reason) => {
            info!("  {} body: {}", direction, reason);
            Some(body)
        }
        BodyLog::Print(size) => {
            let bytes: Bytes = match axum::body::to_bytes(body, size).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    error!("Failed to read {} body: {:?}", direction, err);
                    return None;
                }
            };
            info!("  {} body:\n{}", direction, String::from_utf8_lossy(&bytes));
            Some(Body::from(bytes))
        }
    }
}

pub async fn log_requests(
    State(state): State<ServerState>,
    mut request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let level = state.config.requests_logging_level.clone();
    let start = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    if level > RequestsLoggingLevel::None {
        match request.headers().get(header::RANGE) {
            Some(range) => info!(">>> {} {} [{:?}]", method, request.uri(), range),
            None => info!(">>> {} {}", method, request.uri()),
        }
    }

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Req", request.headers());
    }

    if level >= RequestsLoggingLevel::Body {
        let (parts, body) = request.into_parts();
        let Some(body) = log_body("Req", &parts.headers, body).await else {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };
        request = Request::from_parts(parts, body);
    }

    let mut response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Resp", response.headers());
    }

    if level >= RequestsLoggingLevel::Body {
        let (parts, body) = response.into_parts();
        let Some(body) = log_body("Resp", &parts.headers, body).await else {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };
        response = Response::from_parts(parts, body);
    }

    let status = response.status().as_u16();
    let duration = start.elapsed();

    if level > RequestsLoggingLevel::None {
        info!("<<< {} ({}ms)", status, duration.as_millis());
    }

    record_http_request(&method, &categorize_endpoint(&path), status, duration);

    response
}
