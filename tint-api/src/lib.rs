//! tint-api library - photo colorization service
//!
//! Receives an uploaded image plus optional appearance parameters, runs it
//! through a transform backend inside a per-request scratch scope and
//! returns a single JSON envelope (or an SSE stream ending in one).

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tint_common::config::ServiceConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod backend;
pub mod data_url;
pub mod envelope;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod scope;
pub mod validation;

pub use error::{ColorizeError, Rejection};
pub use pipeline::{ColorizePipeline, PipelineOutcome, RequestState, Submission};

use backend::TransformBackend;

/// Room for multipart boundaries and the `parameters` field on top of the
/// image itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub pipeline: Arc<ColorizePipeline>,
    /// Server startup timestamp for uptime calculation
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServiceConfig, backend: Arc<dyn TransformBackend>) -> Self {
        let pipeline = ColorizePipeline::new(&config, backend);
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .merge(api::colorize_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
