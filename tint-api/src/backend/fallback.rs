//! Remote-first strategy with local fallback

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::{BackendStatus, TransformBackend, TransformOutput, TransformRequest};
use crate::error::ColorizeError;

/// Tries `primary`; on an unreachable or slow primary, runs `secondary`
///
/// Only `BackendUnavailable` and `BackendTimeout` trigger the fallback.
/// Input rejections and transform faults are returned unchanged.
pub struct FallbackBackend {
    primary: Arc<dyn TransformBackend>,
    secondary: Arc<dyn TransformBackend>,
}

impl FallbackBackend {
    pub const NAME: &'static str = "fallback";
    pub const DESCRIPTION: &'static str = "Remote service, local adjustment when it is unreachable";

    pub fn new(primary: Arc<dyn TransformBackend>, secondary: Arc<dyn TransformBackend>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl TransformBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn transform(&self, request: TransformRequest<'_>) -> Result<TransformOutput, ColorizeError> {
        match self.primary.transform(request).await {
            Err(err @ (ColorizeError::BackendUnavailable(_) | ColorizeError::BackendTimeout(_))) => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    "{}; falling back",
                    err
                );
                let mut output = self.secondary.transform(request).await?;
                output.message = Some(format!(
                    "{} unavailable ({}); {} result returned",
                    self.primary.name(),
                    err,
                    self.secondary.name()
                ));
                Ok(output)
            }
            other => other,
        }
    }

    async fn probe(&self) -> BackendStatus {
        self.primary.probe().await
    }
}
