//! Response envelopes
//!
//! Every request ends in exactly one envelope. Success:
//!
//! ```json
//! {"success": true, "image": "data:image/png;base64,...",
//!  "dimensions": {"width": 500, "height": 400},
//!  "metadata": {"processingTime": 1.3, "parametersUsed": {...}, "backend": "local"}}
//! ```
//!
//! Failure: `{"success": false, "error": "<message>"}` with a 4xx/5xx status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::time::Duration;
use tint_common::ColorizationParameters;

use crate::data_url;
use crate::error::{Failure, FailureKind};
use crate::orchestrator::{Dimensions, ProcessingResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    /// Seconds, rounded up to one decimal
    pub processing_time: f64,
    pub parameters_used: ColorizationParameters,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessPayload {
    /// Encoded output image as a data URL
    pub image: String,
    pub dimensions: Dimensions,
    pub metadata: ResultMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPayload {
    pub kind: FailureKind,
    pub status: StatusCode,
    pub message: String,
}

/// Terminal response for one request
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success(SuccessPayload),
    Error(ErrorPayload),
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ResponseEnvelope::Success(_) => StatusCode::OK,
            ResponseEnvelope::Error(err) => err.status,
        }
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResponseEnvelope::Success(payload) => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("image", &payload.image)?;
                map.serialize_entry("dimensions", &payload.dimensions)?;
                map.serialize_entry("metadata", &payload.metadata)?;
                map.end()
            }
            ResponseEnvelope::Error(payload) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", &payload.message)?;
                map.end()
            }
        }
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Builds envelopes from pipeline outcomes
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn assemble(result: ProcessingResult) -> ResponseEnvelope {
        ResponseEnvelope::Success(SuccessPayload {
            image: data_url::encode(&result.media_type, &result.image),
            dimensions: result.dimensions,
            metadata: ResultMetadata {
                processing_time: round_processing_time(result.duration),
                parameters_used: result.parameters,
                backend: result.backend.to_string(),
                message: result.message,
            },
        })
    }

    pub fn assemble_error(failure: &Failure) -> ResponseEnvelope {
        ResponseEnvelope::Error(ErrorPayload {
            kind: failure.kind,
            status: failure.status,
            message: failure.message.clone(),
        })
    }
}

/// Seconds rounded up to the next tenth; any non-zero duration is at least 0.1
pub fn round_processing_time(duration: Duration) -> f64 {
    const TENTH_NANOS: u128 = 100_000_000;
    let tenths = (duration.as_nanos() + TENTH_NANOS - 1) / TENTH_NANOS;
    tenths as f64 / 10.0
}
