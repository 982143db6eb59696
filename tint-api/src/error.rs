//! Error types for tint-api
//!
//! The pipeline distinguishes five failure classes:
//! - `InputRejected`: refused before any scope is opened
//! - `ParameterWarning` (tint-common): non-fatal, defaults substituted
//! - `BackendUnavailable` / `BackendTimeout`: the remote strategy failed
//! - `TransformFault`: anything unexpected inside the transform step
//! - [`CleanupFault`]: scope release trouble, logged only
//!
//! Callers only ever see a coarse [`FailureKind`] and a message.

use axum::http::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why an upload was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No `file` field in the submission
    #[error("No image file provided")]
    MissingFile,

    /// Content type outside the `image/` family
    #[error("Please select a valid image file")]
    NotAnImage { content_type: String },

    /// Upload exceeds the configured limit
    #[error("File size must be less than {}", format_limit(.limit))]
    TooLarge { limit: usize },

    /// An image type that is not on the allow-list
    #[error("Supported formats: {supported}")]
    UnsupportedFormat {
        content_type: String,
        supported: String,
    },

    /// The multipart body itself could not be read
    #[error("Invalid upload: {0}")]
    Malformed(String),

    /// Declared as an image but the bytes do not decode
    ///
    /// Detected during preprocessing, after the scope is open.
    #[error("Invalid image file: {0}")]
    Undecodable(String),
}

impl Rejection {
    /// HTTP status for this rejection (always 4xx)
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MissingFile
            | Rejection::NotAnImage { .. }
            | Rejection::Malformed(_)
            | Rejection::Undecodable(_) => StatusCode::BAD_REQUEST,
            Rejection::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }
}

/// Render a byte limit the way users read it ("10MB", "512KB", "100 bytes")
fn format_limit(limit: &usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * 1024;
    if *limit >= MIB && limit % MIB == 0 {
        format!("{}MB", limit / MIB)
    } else if *limit >= KIB && limit % KIB == 0 {
        format!("{}KB", limit / KIB)
    } else {
        format!("{} bytes", limit)
    }
}

fn whole_secs(duration: &Duration) -> u64 {
    duration.as_secs()
}

/// Pipeline failure taxonomy
#[derive(Debug, Error)]
pub enum ColorizeError {
    #[error(transparent)]
    InputRejected(#[from] Rejection),

    /// Network failure or non-success response from the remote service
    #[error("Backend error: {0}")]
    BackendUnavailable(String),

    /// The remote round trip exceeded the configured timeout
    #[error("Backend error: request timed out after {}s", whole_secs(.0))]
    BackendTimeout(Duration),

    /// Unexpected failure inside the transform step
    #[error("Transform fault: {0}")]
    TransformFault(String),
}

/// Coarse classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ClientInput,
    Backend,
    Internal,
}

impl ColorizeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ColorizeError::InputRejected(_) => FailureKind::ClientInput,
            ColorizeError::BackendUnavailable(_) | ColorizeError::BackendTimeout(_) => {
                FailureKind::Backend
            }
            ColorizeError::TransformFault(_) => FailureKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ColorizeError::InputRejected(rejection) => rejection.status(),
            ColorizeError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
            ColorizeError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ColorizeError::TransformFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the caller
    ///
    /// Transform faults are summarized; their detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ColorizeError::TransformFault(_) => "Failed to process image".to_string(),
            other => other.to_string(),
        }
    }
}

/// Caller-facing failure: classification plus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub status: StatusCode,
    pub message: String,
}

impl From<&ColorizeError> for Failure {
    fn from(err: &ColorizeError) -> Self {
        Self {
            kind: err.kind(),
            status: err.status(),
            message: err.public_message(),
        }
    }
}

/// Secondary diagnostic raised when a scope could not be fully removed
///
/// Never replaces the error that caused the scope to close.
#[derive(Debug, Error)]
#[error("failed to release scope {scope}: {} path(s) not removed", count(.failures))]
pub struct CleanupFault {
    pub scope: String,
    pub failures: Vec<(PathBuf, std::io::Error)>,
}

fn count<T>(items: &[T]) -> usize {
    items.len()
}
