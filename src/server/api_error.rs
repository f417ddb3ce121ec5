//! JSON error responses for the HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::library::LibraryError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal { error: String, details: String },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
}

impl From<&LibraryError> for ApiError {
    fn from(err: &LibraryError) -> Self {
        match err {
            LibraryError::NotFound(id) => ApiError::NotFound(format!("Video not found: {}", id)),
            LibraryError::InvalidArgument(msg) => ApiError::BadRequest(msg.clone()),
            LibraryError::Fetch { .. } => ApiError::Internal {
                error: "Failed to process video".to_string(),
                details: err.to_string(),
            },
            LibraryError::Io(_) => ApiError::Internal {
                error: "Library I/O failure".to_string(),
                details: err.to_string(),
            },
        }
    }
}

impl From<LibraryError> for ApiError {
    fn from(err: LibraryError) -> Self {
        ApiError::from(&err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(error) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error,
                    details: None,
                },
            ),
            ApiError::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error,
                    details: None,
                },
            ),
            ApiError::Internal { error, details } => {
                error!("{}: {}", error, details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error,
                        details: Some(details),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
