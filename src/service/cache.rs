use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, CacheError};
use crate::storage::ident::CacheKey;
use crate::utils::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    /// Taken verbatim as a single cache key; comma-separated candidate
    /// lists are not expanded.
    pub keys: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub cache_key: String,
    pub archive_location: String,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub key: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveResponse {
    pub cache_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub size: u64,
}

/// GET /_apis/artifactcache/cache?keys=<key>&version=<version>
///
/// A hit answers 200 with the download locator, a miss answers 204 with no
/// body so the client can tell "nothing cached" from "lookup failed".
pub async fn lookup_cache(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let cache_key = CacheKey::new(params.keys, params.version)?;
    let origin = request_origin(&headers, &state);
    let resolved = state
        .store
        .resolve(&cache_key, &origin)
        .await
        .map_err(|e| match e {
            CacheError::Io(e) => AppError::BadRequest(format!("cache lookup failed: {e}")),
            other => AppError::from(other),
        })?;
    match resolved {
        Some(entry) => Ok((
            StatusCode::OK,
            Json(LookupResponse {
                cache_key: entry.cache_key,
                archive_location: entry.archive_location,
            }),
        )
            .into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /_apis/artifactcache/caches
pub async fn reserve_cache(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReserveRequest>,
) -> Result<Json<ReserveResponse>, AppError> {
    let cache_key = CacheKey::new(req.key, req.version)?;
    let cache_id = cache_key.encode();
    state.store.reserve(&cache_id).await?;
    tracing::info!(%cache_id, "reserved cache entry");
    Ok(Json(ReserveResponse { cache_id }))
}

/// PATCH /_apis/artifactcache/caches/<cache_id>
///
/// The body is a raw chunk; `Content-Range` in the `bytes <a>-<b>/*` form
/// the Actions client sends carries the absolute write offset.
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    Path(cache_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    CacheKey::decode(&cache_id)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != "application/octet-stream" {
        return Err(AppError::UnsupportedMediaType);
    }
    let offset = chunk_offset(&headers, body.len() as u64)?;
    state.store.write_chunk(&cache_id, offset, &body).await?;
    Ok(StatusCode::OK)
}

/// POST /_apis/artifactcache/caches/<cache_id>
pub async fn commit_cache(
    State(state): State<Arc<AppState>>,
    Path(cache_id): Path<String>,
    Json(req): Json<CommitRequest>,
) -> Result<StatusCode, AppError> {
    CacheKey::decode(&cache_id)?;
    state.store.finalize(&cache_id, req.size).await?;
    tracing::info!(%cache_id, size = req.size, "committed cache entry");
    Ok(StatusCode::OK)
}

/// The base URL for download locators: the request's `Origin` when present,
/// else the configured public URL.
fn request_origin(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.public_url.clone())
}

/// Extracts the absolute write offset from `Content-Range`. A missing
/// header means a whole-body write at offset 0.
fn chunk_offset(headers: &HeaderMap, body_len: u64) -> Result<u64, AppError> {
    let Some(range) = headers
        .get(header::CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(0);
    };
    let re = Regex::new(r"^bytes (\d+)-(\d+)/(\*|\d+)$").unwrap();
    let caps = re.captures(range).ok_or_else(|| {
        CacheError::InvalidRange(format!("unparseable Content-Range `{range}`"))
    })?;
    let start: u64 = caps[1]
        .parse()
        .map_err(|_| CacheError::InvalidRange("start offset out of range".to_string()))?;
    let end: u64 = caps[2]
        .parse()
        .map_err(|_| CacheError::InvalidRange("end offset out of range".to_string()))?;
    if start > end {
        return Err(CacheError::InvalidRange(
            "start offset is greater than end offset".to_string(),
        )
        .into());
    }
    if end - start + 1 != body_len {
        return Err(CacheError::InvalidRange(
            "Content-Range span does not match body length".to_string(),
        )
        .into());
    }
    Ok(start)
}
