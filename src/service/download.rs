use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use crate::error::AppError;
use crate::storage::ident::CacheKey;
use crate::utils::state::AppState;

/// GET /download/<cache_id>
///
/// Plain byte serving for committed artifacts. Anything that is not a
/// committed artifact, a garbage identifier included, is a 404.
pub async fn download_artifact(
    State(state): State<Arc<AppState>>,
    Path(cache_id): Path<String>,
) -> Result<Response, AppError> {
    if CacheKey::decode(&cache_id).is_err() {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let Some((meta, reader)) = state.store.open(&cache_id).await? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let body = Body::from_stream(ReaderStream::new(reader));
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, meta.size)
        .body(body)
        .unwrap())
}
