//! Streaming colorization over Server-Sent Events
//!
//! Emits `progress` events (`{percentage, stage, label, timestamp}`) as the
//! request advances, then exactly one `result` event carrying the envelope.
//! The stream ends after `result`.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, warn};

use super::colorize::{outcome_envelope, read_request, spawn_pipeline};
use crate::progress::ProgressReporter;
use crate::AppState;

/// POST /api/colorize/stream
pub async fn colorize_stream(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let submission = read_request(multipart, state.pipeline.validator().max_bytes()).await;
    let (reporter, mut events) = ProgressReporter::channel();
    let task = spawn_pipeline(&state, submission, reporter);

    let stream = async_stream::stream! {
        // Closes once the reporter finishes (or the task ends)
        while let Some(event) = events.recv().await {
            yield Ok(json_event("progress", &event));
        }

        let envelope = outcome_envelope(task.await);
        debug!(success = envelope.is_success(), "SSE: sending result");
        yield Ok(json_event("result", &envelope));
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn json_event<T: Serialize>(name: &'static str, payload: &T) -> Event {
    Event::default().event(name).json_data(payload).unwrap_or_else(|e| {
        warn!("SSE: failed to encode {} event: {}", name, e);
        Event::default().event(name).data("{}")
    })
}
