use axum::Json;
use axum::extract::Request;
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Logs every request line with the response status, the same visibility
/// the emulated service gets from its payload-logging middleware.
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    tracing::info!(%method, %uri, status = %response.status(), "request");
    response
}

/// Echoes unmatched requests back as JSON so unimplemented corners of the
/// protocol show up in client logs instead of failing silently.
pub async fn unmatched_route(method: Method, uri: Uri) -> impl IntoResponse {
    tracing::warn!(%method, %uri, "unmatched route");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "requestMethod": method.as_str(),
            "requestURI": uri.to_string(),
        })),
    )
}
