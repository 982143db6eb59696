//! Colorization endpoint
//!
//! Accepts `multipart/form-data` with a `file` field (the image) and an
//! optional `parameters` field (JSON object of appearance overrides).

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tracing::{debug, error};

use crate::envelope::{ResponseEnvelope, ResultAssembler};
use crate::error::{ColorizeError, Failure, Rejection};
use crate::pipeline::{PipelineOutcome, Submission};
use crate::progress::ProgressReporter;
use crate::validation::UploadedImage;
use crate::AppState;

/// POST /api/colorize
///
/// Always answers with an envelope; the HTTP status mirrors its outcome.
pub async fn colorize(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ResponseEnvelope {
    let submission = read_request(multipart, state.pipeline.validator().max_bytes()).await;
    let outcome = spawn_pipeline(&state, submission, ProgressReporter::detached()).await;
    outcome_envelope(outcome)
}

/// Run the pipeline on its own task
///
/// A caller that disconnects mid-request drops this future, not the
/// pipeline: the spawned task still reaches `ScopeReleased`.
pub(crate) fn spawn_pipeline(
    state: &AppState,
    submission: Submission,
    progress: ProgressReporter,
) -> tokio::task::JoinHandle<PipelineOutcome> {
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move { pipeline.run(submission, progress).await })
}

/// Unwrap a joined pipeline task into its envelope
pub(crate) fn outcome_envelope(
    joined: Result<PipelineOutcome, tokio::task::JoinError>,
) -> ResponseEnvelope {
    match joined {
        Ok(outcome) => outcome.envelope,
        Err(e) => {
            error!("Pipeline task aborted: {}", e);
            let fault = ColorizeError::TransformFault(e.to_string());
            ResultAssembler::assemble_error(&Failure::from(&fault))
        }
    }
}

/// Turn the raw multipart body into a [`Submission`]
pub(crate) async fn read_request(
    multipart: Result<Multipart, MultipartRejection>,
    max_bytes: usize,
) -> Submission {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return Submission::rejected(Rejection::Malformed(rejection.body_text())),
    };

    match read_fields(multipart, max_bytes).await {
        Ok((Some(file), parameters)) => Submission::new(file, parameters),
        Ok((None, _)) => Submission::rejected(Rejection::MissingFile),
        Err(rejection) => Submission::rejected(rejection),
    }
}

async fn read_fields(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<(Option<UploadedImage>, Option<String>), Rejection> {
    let mut file = None;
    let mut parameters = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| field_rejection(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" if file.is_none() => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| field_rejection(e, max_bytes))?;
                file = Some(UploadedImage::new(bytes.to_vec(), content_type, filename));
            }
            "parameters" => {
                let bytes = field.bytes().await.map_err(|e| field_rejection(e, max_bytes))?;
                // Invalid UTF-8 falls through to the JSON parser and becomes a warning
                parameters = Some(String::from_utf8_lossy(&bytes).into_owned());
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok((file, parameters))
}

fn field_rejection(err: MultipartError, max_bytes: usize) -> Rejection {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Rejection::TooLarge { limit: max_bytes }
    } else {
        Rejection::Malformed(err.body_text())
    }
}

/// Build colorization routes
pub fn colorize_routes() -> Router<AppState> {
    Router::new()
        .route("/api/colorize", post(colorize))
        .route("/api/colorize/stream", post(super::stream::colorize_stream))
}
