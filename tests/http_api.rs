use std::sync::Arc;
use std::time::Duration;

use actions_cache::api;
use actions_cache::config::Config;
use actions_cache::utils::state::AppState;

/// Serves the full router on an ephemeral port and returns its base URL.
async fn spawn_server(root: &std::path::Path) -> String {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        root_dir: root.to_string_lossy().into_owned(),
        public_url: "http://cache.test".to_string(),
        retention: Duration::from_secs(7 * 24 * 60 * 60),
    };
    let state = Arc::new(AppState::new(config));
    let app = api::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn reserve(client: &reqwest::Client, base: &str, key: &str, version: &str) -> reqwest::Response {
    client
        .post(format!("{base}/_apis/artifactcache/caches"))
        .json(&serde_json::json!({ "key": key, "version": version }))
        .send()
        .await
        .unwrap()
}

async fn upload(
    client: &reqwest::Client,
    base: &str,
    cache_id: &str,
    range: &str,
    bytes: &'static [u8],
) -> reqwest::Response {
    client
        .patch(format!("{base}/_apis/artifactcache/caches/{cache_id}"))
        .header("content-type", "application/octet-stream")
        .header("content-range", range)
        .body(bytes)
        .send()
        .await
        .unwrap()
}

async fn commit(client: &reqwest::Client, base: &str, cache_id: &str, size: u64) -> reqwest::Response {
    client
        .post(format!("{base}/_apis/artifactcache/caches/{cache_id}"))
        .json(&serde_json::json!({ "size": size }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn full_cache_protocol() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();

    // Nothing cached yet: a lookup misses with 204.
    let miss = client
        .get(format!(
            "{base}/_apis/artifactcache/cache?keys=readme-hash&version=v1"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(miss.status(), 204);

    // Reserve the slot.
    let reserved = reserve(&client, &base, "readme-hash", "v1").await;
    assert_eq!(reserved.status(), 200);
    let body: serde_json::Value = reserved.json().await.unwrap();
    let cache_id = body["cacheId"].as_str().unwrap().to_string();

    // Reserving the same pair again is rejected.
    assert_eq!(reserve(&client, &base, "readme-hash", "v1").await.status(), 400);

    // Chunks arrive out of order.
    assert_eq!(upload(&client, &base, &cache_id, "bytes 5-9/*", b"world").await.status(), 200);
    assert_eq!(upload(&client, &base, &cache_id, "bytes 0-4/*", b"hello").await.status(), 200);

    // A wrong declared size is a client error and leaves the upload open.
    assert_eq!(commit(&client, &base, &cache_id, 99).await.status(), 400);
    assert_eq!(commit(&client, &base, &cache_id, 10).await.status(), 200);

    // After commit, reservation is permanently rejected.
    assert_eq!(reserve(&client, &base, "readme-hash", "v1").await.status(), 400);

    // Lookup hits and points at the download route, honoring Origin.
    let hit = client
        .get(format!(
            "{base}/_apis/artifactcache/cache?keys=readme-hash&version=v1"
        ))
        .header("origin", "http://host")
        .send()
        .await
        .unwrap();
    assert_eq!(hit.status(), 200);
    let body: serde_json::Value = hit.json().await.unwrap();
    assert_eq!(body["cacheKey"].as_str().unwrap(), cache_id);
    assert_eq!(
        body["archiveLocation"].as_str().unwrap(),
        format!("http://host/download/{cache_id}")
    );

    // Without an Origin header the configured public URL is used.
    let hit = client
        .get(format!(
            "{base}/_apis/artifactcache/cache?keys=readme-hash&version=v1"
        ))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = hit.json().await.unwrap();
    assert_eq!(
        body["archiveLocation"].as_str().unwrap(),
        format!("http://cache.test/download/{cache_id}")
    );

    // The artifact downloads byte-identical.
    let download = client
        .get(format!("{base}/download/{cache_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(download.status(), 200);
    assert_eq!(download.headers()["content-length"], "10");
    assert_eq!(download.bytes().await.unwrap().as_ref(), b"helloworld");
}

#[tokio::test]
async fn rejected_requests() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();

    // Key containing the codec delimiter.
    assert_eq!(reserve(&client, &base, "bad|key", "v1").await.status(), 400);

    // Chunk upload without a reservation.
    let reserved = reserve(&client, &base, "real-key", "v1").await;
    let body: serde_json::Value = reserved.json().await.unwrap();
    let cache_id = body["cacheId"].as_str().unwrap().to_string();

    // Wrong content type.
    let response = client
        .patch(format!("{base}/_apis/artifactcache/caches/{cache_id}"))
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Malformed Content-Range.
    let response = client
        .patch(format!("{base}/_apis/artifactcache/caches/{cache_id}"))
        .header("content-type", "application/octet-stream")
        .header("content-range", "five-ten")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Commit for an identifier that was never reserved.
    let ghost_id = {
        use actions_cache::storage::ident::CacheKey;
        CacheKey::new("never", "reserved").unwrap().encode()
    };
    assert_eq!(commit(&client, &base, &ghost_id, 1).await.status(), 400);

    // Downloading an absent or garbage identifier is a plain 404.
    let response = client
        .get(format!("{base}/download/{ghost_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let response = client
        .get(format!("{base}/download/not-base64!"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Unmatched routes echo the request as JSON.
    let response = client
        .get(format!("{base}/_apis/artifactcache/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["requestMethod"].as_str().unwrap(), "GET");
}

#[tokio::test]
async fn ping_answers_pong() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let response = reqwest::get(format!("{base}/ping")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"].as_str().unwrap(), "pong");
}
