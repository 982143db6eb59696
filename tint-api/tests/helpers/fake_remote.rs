//! Fake remote colorization service
//!
//! Speaks the same contract as the real service: multipart `file` +
//! `parameters` in, `{"colorized_image", "message"}` or `{"detail"}` out.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake answers `/colorize`
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Return the uploaded bytes as a PNG data URL
    Echo,
    /// Return a bare base64 string instead of a data URL
    EchoBareBase64,
    /// Non-success status, with an optional `detail`
    Fail { status: u16, detail: Option<String> },
    /// Sleep before answering like `Echo`
    Slow(Duration),
}

#[derive(Clone)]
struct FakeState {
    behavior: FakeBehavior,
    calls: Arc<AtomicUsize>,
    last_parameters: Arc<Mutex<Option<String>>>,
}

/// Handle to a running fake service
pub struct FakeRemote {
    pub url: String,
    calls: Arc<AtomicUsize>,
    last_parameters: Arc<Mutex<Option<String>>>,
}

impl FakeRemote {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The `parameters` field of the most recent request
    pub fn last_parameters(&self) -> Option<serde_json::Value> {
        self.last_parameters
            .lock()
            .unwrap()
            .as_deref()
            .map(|raw| serde_json::from_str(raw).unwrap())
    }
}

pub async fn spawn_fake_remote(behavior: FakeBehavior) -> FakeRemote {
    let calls = Arc::new(AtomicUsize::new(0));
    let last_parameters = Arc::new(Mutex::new(None));
    let state = FakeState {
        behavior,
        calls: calls.clone(),
        last_parameters: last_parameters.clone(),
    };

    let app = Router::new()
        .route("/colorize", post(fake_colorize))
        .route("/health", get(|| async { Json(json!({"status": "healthy"})) }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeRemote {
        url: format!("http://{}", addr),
        calls,
        last_parameters,
    }
}

/// URL of a port nothing is listening on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn fake_colorize(State(state): State<FakeState>, mut multipart: Multipart) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);

    let mut file = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => file = field.bytes().await.unwrap().to_vec(),
            Some("parameters") => {
                let text = field.text().await.unwrap();
                *state.last_parameters.lock().unwrap() = Some(text);
            }
            _ => {}
        }
    }

    let echo = || {
        Json(json!({
            "colorized_image": format!("data:image/png;base64,{}", STANDARD.encode(&file)),
            "message": "Image colorized successfully"
        }))
        .into_response()
    };

    match &state.behavior {
        FakeBehavior::Echo => echo(),
        FakeBehavior::EchoBareBase64 => Json(json!({
            "colorized_image": STANDARD.encode(&file),
        }))
        .into_response(),
        FakeBehavior::Fail { status, detail } => {
            let body = match detail {
                Some(detail) => json!({ "detail": detail }),
                None => json!({}),
            };
            (StatusCode::from_u16(*status).unwrap(), Json(body)).into_response()
        }
        FakeBehavior::Slow(delay) => {
            tokio::time::sleep(*delay).await;
            echo()
        }
    }
}
