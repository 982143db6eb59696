//! Remote colorization service client
//!
//! Forwards the upload and merged parameters to `{base_url}/colorize` as
//! multipart form data and relays the returned image. The service answers
//! with `{"colorized_image": "<data URL>", "message": "..."}` on success and
//! `{"detail": "..."}` on failure.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{BackendStatus, TransformBackend, TransformOutput, TransformRequest};
use crate::data_url;
use crate::error::ColorizeError;

const USER_AGENT: &str = concat!("tint-api/", env!("CARGO_PKG_VERSION"));

/// Fallback message when the service gives no `detail`
pub const GENERIC_FAILURE: &str = "Backend colorization failed";

/// Success body from the remote service
#[derive(Debug, Clone, Deserialize)]
struct ColorizeResponse {
    colorized_image: String,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the remote colorization service
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    health_timeout: Duration,
}

impl RemoteBackend {
    pub const NAME: &'static str = "remote";
    pub const DESCRIPTION: &'static str = "External colorization service over HTTP";

    pub fn new(
        base_url: &str,
        timeout: Duration,
        health_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            health_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ColorizeError {
        if err.is_timeout() {
            ColorizeError::BackendTimeout(self.timeout)
        } else {
            ColorizeError::BackendUnavailable(err.to_string())
        }
    }

    fn build_form(&self, request: &TransformRequest<'_>) -> Result<Form, ColorizeError> {
        let image = request.image;
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.media_type())
            .map_err(|e| ColorizeError::TransformFault(format!("invalid upload media type: {}", e)))?;
        let parameters = serde_json::to_string(&request.parameters)
            .map_err(|e| ColorizeError::TransformFault(format!("parameter encoding failed: {}", e)))?;

        Ok(Form::new().part("file", part).text("parameters", parameters))
    }
}

#[async_trait]
impl TransformBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn transform(&self, request: TransformRequest<'_>) -> Result<TransformOutput, ColorizeError> {
        let url = format!("{}/colorize", self.base_url);
        let form = self.build_form(&request)?;

        debug!(url = %url, bytes = request.image.size(), "Forwarding to remote backend");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("detail").and_then(|d| d.as_str()).map(str::to_string));
            warn!(status = status.as_u16(), detail = ?detail, "Remote backend refused request");
            return Err(ColorizeError::BackendUnavailable(
                detail.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            ));
        }

        let body: ColorizeResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ColorizeError::BackendTimeout(self.timeout)
            } else {
                ColorizeError::BackendUnavailable(format!("unreadable response: {}", e))
            }
        })?;

        let decoded = data_url::decode(&body.colorized_image)
            .map_err(|e| ColorizeError::BackendUnavailable(format!("unexpected image format: {}", e)))?;
        let media_type = decoded
            .media_type
            .unwrap_or_else(|| sniff_media_type(&decoded.bytes).to_string());

        Ok(TransformOutput {
            bytes: decoded.bytes,
            media_type,
            produced_by: Self::NAME,
            message: body.message,
        })
    }

    async fn probe(&self) -> BackendStatus {
        let url = format!("{}/health", self.base_url);
        match self
            .http_client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => BackendStatus::Healthy,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Remote health check failed");
                BackendStatus::Unavailable
            }
            Err(e) => {
                debug!("Remote health check failed: {}", e);
                BackendStatus::Unavailable
            }
        }
    }
}

/// Media type from magic bytes; the service emits JPEG by default
fn sniff_media_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::WebP) => "image/webp",
        _ => "image/jpeg",
    }
}
