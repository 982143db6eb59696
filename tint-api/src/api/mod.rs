//! HTTP API handlers for tint-api
//!
//! - `POST /api/colorize`: one request, one JSON envelope
//! - `POST /api/colorize/stream`: same request, progress over SSE
//! - `GET /health`, `GET /api/backends`, `GET /`

pub mod colorize;
pub mod health;
pub mod stream;

pub use colorize::colorize_routes;
pub use health::health_routes;
