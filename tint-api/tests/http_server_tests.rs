//! HTTP Server & Routing Integration Tests
//!
//! Exercise the router end to end with `tower::ServiceExt::oneshot`.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::*;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tint_api::backend::LocalBackend;
use tint_api::{build_router, AppState};
use tower::ServiceExt;

fn test_app(scratch: &TempDir) -> Router {
    let state = AppState::new(test_config(scratch.path()), Arc::new(LocalBackend::new()));
    build_router(state)
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let scratch = TempDir::new().unwrap();
    let response = test_app(&scratch).oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let endpoints: Vec<&str> = json["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap())
        .collect();
    assert!(endpoints.contains(&"POST /api/colorize"));
    assert!(endpoints.contains(&"GET /health"));
}

#[tokio::test]
async fn test_health_reports_local_backend() {
    let scratch = TempDir::new().unwrap();
    let response = test_app(&scratch).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "tint-api");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["uptime_seconds"].is_u64());
    assert_eq!(json["backend"]["strategy"], "local");
    assert_eq!(json["backend"]["status"], "local");
}

#[tokio::test]
async fn test_backends_listing() {
    let scratch = TempDir::new().unwrap();
    let response = test_app(&scratch).oneshot(get("/api/backends")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let backends = json["backends"].as_array().unwrap();
    assert_eq!(backends.len(), 1);
    assert_eq!(backends[0]["name"], "local");
    assert_eq!(backends[0]["active"], true);
}

#[tokio::test]
async fn test_colorize_png_returns_success_envelope() {
    let scratch = TempDir::new().unwrap();
    let request = MultipartBuilder::new()
        .file("image/png", "photo.png", &png_bytes(40, 30))
        .text("parameters", r#"{"intensity": 80, "temperature": -20}"#)
        .into_request("/api/colorize");

    let response = test_app(&scratch).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["dimensions"]["width"], 40);
    assert_eq!(json["dimensions"]["height"], 30);
    assert_eq!(json["metadata"]["parametersUsed"]["intensity"], 80.0);
    assert_eq!(json["metadata"]["parametersUsed"]["temperature"], -20.0);
    assert_eq!(json["metadata"]["parametersUsed"]["saturation"], 100.0);
    assert!(json["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_colorize_without_file_is_400() {
    let scratch = TempDir::new().unwrap();
    let request = MultipartBuilder::new()
        .text("parameters", "{}")
        .into_request("/api/colorize");

    let response = test_app(&scratch).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "No image file provided");
}

#[tokio::test]
async fn test_colorize_text_file_is_400() {
    let scratch = TempDir::new().unwrap();
    let request = MultipartBuilder::new()
        .file("text/plain", "notes.txt", b"just words")
        .into_request("/api/colorize");

    let response = test_app(&scratch).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Please select a valid image file");
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_colorize_gif_is_415() {
    let scratch = TempDir::new().unwrap();
    let request = MultipartBuilder::new()
        .file("image/gif", "anim.gif", b"GIF89a")
        .into_request("/api/colorize");

    let response = test_app(&scratch).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Supported formats: JPG, PNG, WEBP");
}

#[tokio::test]
async fn test_colorize_over_limit_is_413() {
    let scratch = TempDir::new().unwrap();
    let mut config = test_config(scratch.path());
    config.max_upload_bytes = 1024;
    let app = build_router(AppState::new(config, Arc::new(LocalBackend::new())));

    let request = MultipartBuilder::new()
        .file("image/png", "big.png", &vec![7u8; 4096])
        .into_request("/api/colorize");
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["error"], "File size must be less than 1KB");
}

#[tokio::test]
async fn test_colorize_body_over_transport_limit_is_413() {
    let scratch = TempDir::new().unwrap();
    let mut config = test_config(scratch.path());
    config.max_upload_bytes = 1024;
    let app = build_router(AppState::new(config, Arc::new(LocalBackend::new())));

    // Larger than the upload limit plus multipart slack, so the body limit
    // trips while the file field is still being read
    let request = MultipartBuilder::new()
        .file("image/png", "huge.png", &vec![7u8; 300 * 1024])
        .into_request("/api/colorize");
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "File size must be less than 1KB");
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn test_colorize_non_multipart_body_is_400_envelope() {
    let scratch = TempDir::new().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/colorize")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"image": "nope"}"#))
        .unwrap();

    let response = test_app(&scratch).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid upload"));
}

/// Split an SSE body into (event, data) pairs
fn parse_sse(body: &str) -> Vec<(String, String)> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut event = None;
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_string());
                } else if let Some(chunk) = line.strip_prefix("data:") {
                    data.push_str(chunk.trim_start());
                }
            }
            event.map(|e| (e, data))
        })
        .collect()
}

#[tokio::test]
async fn test_stream_emits_progress_then_single_result() {
    let scratch = TempDir::new().unwrap();
    let request = MultipartBuilder::new()
        .file("image/png", "photo.png", &png_bytes(24, 24))
        .into_request("/api/colorize/stream");

    let response = test_app(&scratch).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let events = parse_sse(&body);

    let progress: Vec<u64> = events
        .iter()
        .filter(|(name, _)| name == "progress")
        .map(|(_, data)| serde_json::from_str::<Value>(data).unwrap()["percentage"].as_u64().unwrap())
        .collect();
    assert_eq!(progress, vec![10, 30, 60, 85, 95]);

    let results: Vec<_> = events.iter().filter(|(name, _)| name == "result").collect();
    assert_eq!(results.len(), 1);
    assert_eq!(events.last().unwrap().0, "result");
    let envelope: Value = serde_json::from_str(&results[0].1).unwrap();
    assert_eq!(envelope["success"], true);
}

#[tokio::test]
async fn test_stream_rejection_sends_only_result() {
    let scratch = TempDir::new().unwrap();
    let request = MultipartBuilder::new()
        .file("text/plain", "notes.txt", b"words")
        .into_request("/api/colorize/stream");

    let response = test_app(&scratch).oneshot(request).await.unwrap();
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let events = parse_sse(&body);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "result");
    let envelope: Value = serde_json::from_str(&events[0].1).unwrap();
    assert_eq!(envelope["success"], false);
}
