//! Health check, backend listing and service index

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::backend::{self, BackendInfo, BackendStatus};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the remote backend cannot be reached
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub uptime_seconds: u64,
    pub backend: BackendHealth,
}

#[derive(Debug, Serialize)]
pub struct BackendHealth {
    pub strategy: String,
    pub status: BackendStatus,
}

/// GET /health
///
/// Probes the active backend; a dead remote service is reported, never
/// raised.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let backend = state.pipeline.backend();
    let backend_status = backend.probe().await;
    let status = match backend_status {
        BackendStatus::Unavailable => "degraded",
        BackendStatus::Healthy | BackendStatus::Local => "ok",
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "tint-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        uptime_seconds,
        backend: BackendHealth {
            strategy: backend.name().to_string(),
            status: backend_status,
        },
    })
}

#[derive(Debug, Serialize)]
pub struct BackendsResponse {
    pub backends: Vec<BackendInfo>,
}

/// GET /api/backends
pub async fn list_backends(State(state): State<AppState>) -> Json<BackendsResponse> {
    let active = state.pipeline.backend().name();
    Json(BackendsResponse {
        backends: backend::catalog(&state.config, active),
    })
}

#[derive(Debug, Serialize)]
pub struct ServiceIndex {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<&'static str>,
}

/// GET /
pub async fn service_index() -> Json<ServiceIndex> {
    Json(ServiceIndex {
        message: "tint colorization API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "POST /api/colorize",
            "POST /api/colorize/stream",
            "GET /api/backends",
            "GET /health",
        ],
    })
}

/// Build health and discovery routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(service_index))
        .route("/health", get(health_check))
        .route("/api/backends", get(list_backends))
}
