//! Transform orchestration
//!
//! Drives one validated request through preprocessing, the core transform
//! and post-adjustment, reporting progress at each boundary and keeping
//! every intermediate file inside the request's scope.

use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tint_common::{ColorizationParameters, ProgressStage};
use tracing::{debug, warn};

use crate::backend::{TransformBackend, TransformRequest};
use crate::data_url::extension_for;
use crate::error::{ColorizeError, Rejection};
use crate::progress::ProgressReporter;
use crate::scope::ScopeHandle;
use crate::validation::UploadedImage;

/// Pixel dimensions of the output image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Everything the assembler needs for a success envelope
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub image: Vec<u8>,
    pub media_type: String,
    pub dimensions: Dimensions,
    pub duration: Duration,
    pub parameters: ColorizationParameters,
    pub backend: &'static str,
    pub message: Option<String>,
}

/// Runs the transform stages for one request at a time
#[derive(Clone)]
pub struct TransformOrchestrator {
    backend: Arc<dyn TransformBackend>,
}

impl TransformOrchestrator {
    pub fn new(backend: Arc<dyn TransformBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn TransformBackend> {
        &self.backend
    }

    /// Produce the output image for `image`
    ///
    /// Emits Preprocessing, CoreTransform, PostAdjustment and Finalize in
    /// order. The caller owns `scope` and releases it whatever this returns.
    pub async fn execute(
        &self,
        image: &UploadedImage,
        parameters: ColorizationParameters,
        scope: &mut ScopeHandle,
        progress: &mut ProgressReporter,
    ) -> Result<ProcessingResult, ColorizeError> {
        let started = Instant::now();

        progress.emit(ProgressStage::Preprocessing);
        let media_type = image.media_type();
        scope
            .write_artifact(&format!("input.{}", extension_for(&media_type)), &image.bytes)
            .await
            .map_err(|e| ColorizeError::TransformFault(format!("failed to stage input: {}", e)))?;
        let input_dimensions = read_dimensions(&image.bytes).map_err(Rejection::Undecodable)?;
        debug!(
            width = input_dimensions.width,
            height = input_dimensions.height,
            "Input decoded"
        );

        progress.emit(ProgressStage::CoreTransform);
        let output = self
            .backend
            .transform(TransformRequest { image, parameters })
            .await?;

        progress.emit(ProgressStage::PostAdjustment);
        let dimensions = match read_dimensions(&output.bytes) {
            Ok(dimensions) => dimensions,
            Err(e) => {
                warn!("Could not read output dimensions ({}), reporting input size", e);
                input_dimensions
            }
        };

        progress.emit(ProgressStage::Finalize);
        scope
            .write_artifact(&format!("output.{}", extension_for(&output.media_type)), &output.bytes)
            .await
            .map_err(|e| ColorizeError::TransformFault(format!("failed to stage output: {}", e)))?;

        let duration = started.elapsed();
        debug!(
            backend = output.produced_by,
            elapsed_ms = duration.as_millis() as u64,
            "Transform complete"
        );

        Ok(ProcessingResult {
            image: output.bytes,
            media_type: output.media_type,
            dimensions,
            duration,
            parameters,
            backend: output.produced_by,
            message: output.message,
        })
    }
}

/// Read width and height from the image header without decoding pixels
pub fn read_dimensions(bytes: &[u8]) -> Result<Dimensions, String> {
    let (width, height) = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())?;
    Ok(Dimensions { width, height })
}
