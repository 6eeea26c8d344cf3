use std::io;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors produced by the cache storage engine. Every variant is
/// recoverable at the request layer; none terminates the process.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("cache entry is already committed: {0}")]
    AlreadyCommitted(String),

    #[error("cache entry is already reserved: {0}")]
    AlreadyReserved(String),

    #[error("no reservation exists for identifier: {0}")]
    NoSuchReservation(String),

    #[error("size mismatch: declared {expected} bytes, placeholder holds {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("invalid byte range: {0}")]
    InvalidRange(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Transport-layer rejection. Wraps engine errors and adds the few
/// conditions only the HTTP surface can detect.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{0}")]
    BadRequest(String),

    #[error("unsupported media type: chunk uploads must be application/octet-stream")]
    UnsupportedMediaType,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // An IO failure means storage-layer trouble rather than bad client
        // input; it surfaces as a hard operational error.
        let status = match &self {
            AppError::Cache(CacheError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Cache(_) | AppError::BadRequest(_) | AppError::UnsupportedMediaType => {
                StatusCode::BAD_REQUEST
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "storage failure while handling request");
        } else {
            tracing::warn!(error = %self, "rejecting request");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
