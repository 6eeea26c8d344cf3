pub mod middleware;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::{Json, Router, middleware as axum_middleware};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::service::cache::{commit_cache, lookup_cache, reserve_cache, upload_chunk};
use crate::service::download::download_artifact;
use crate::utils::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(|| async { Json(json!({ "message": "pong" })) }))
        .nest("/_apis/artifactcache", cache_router())
        .route("/download/{cache_id}", get(download_artifact))
        .fallback(middleware::unmatched_route)
        .layer(axum_middleware::from_fn(middleware::log_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cache_router() -> Router<Arc<AppState>> {
    Router::new()
        // Lookup by key and version
        .route("/cache", get(lookup_cache))
        // Reserve a cache entry
        .route("/caches", post(reserve_cache))
        // Upload a byte range, then commit with the declared size
        .route("/caches/{cache_id}", patch(upload_chunk).post(commit_cache))
}
