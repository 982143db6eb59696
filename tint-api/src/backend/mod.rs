//! Transform backends
//!
//! A backend turns one validated upload plus merged parameters into an output
//! image. Two concrete strategies exist: a remote colorization service and a
//! local tonal approximation. A fallback wrapper combines them.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tint_common::config::{BackendMode, ServiceConfig};
use tint_common::ColorizationParameters;

use crate::error::ColorizeError;
use crate::validation::UploadedImage;

pub mod fallback;
pub mod local;
pub mod remote;

pub use fallback::FallbackBackend;
pub use local::LocalBackend;
pub use remote::RemoteBackend;

/// Input handed to a backend
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    pub image: &'a UploadedImage,
    pub parameters: ColorizationParameters,
}

/// Image produced by a backend
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub bytes: Vec<u8>,
    pub media_type: String,
    /// Strategy that actually produced the image
    pub produced_by: &'static str,
    /// Informational note to relay to the caller
    pub message: Option<String>,
}

/// Reachability as reported by `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Healthy,
    Unavailable,
    /// In-process strategy; nothing to probe
    Local,
}

/// Backend trait - every transform strategy implements this
#[async_trait]
pub trait TransformBackend: Send + Sync {
    /// Strategy identifier ("local", "remote", "fallback")
    fn name(&self) -> &'static str;

    /// One-line description for `/api/backends`
    fn description(&self) -> &'static str;

    /// Produce the output image
    ///
    /// # Returns
    /// * `Err(BackendUnavailable | BackendTimeout)` - remote strategy failed
    /// * `Err(InputRejected(Undecodable))` - input bytes are not an image
    /// * `Err(TransformFault)` - anything else
    async fn transform(&self, request: TransformRequest<'_>) -> Result<TransformOutput, ColorizeError>;

    /// Check reachability without transforming anything
    async fn probe(&self) -> BackendStatus {
        BackendStatus::Local
    }
}

/// Listing entry for `/api/backends`
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub active: bool,
}

/// Build the configured strategy
pub fn from_config(config: &ServiceConfig) -> tint_common::Result<Arc<dyn TransformBackend>> {
    let local: Arc<dyn TransformBackend> = Arc::new(LocalBackend::new());

    let Some(url) = config.backend_url.as_deref() else {
        // validate() guarantees a URL in remote mode
        return Ok(local);
    };

    match config.backend_mode {
        BackendMode::Local => Ok(local),
        BackendMode::Remote => {
            let remote: Arc<dyn TransformBackend> = Arc::new(
                RemoteBackend::new(url, config.backend_timeout, config.health_timeout)
                    .map_err(|e| tint_common::Error::Config(format!("HTTP client: {}", e)))?,
            );
            if config.fallback_to_local {
                Ok(Arc::new(FallbackBackend::new(remote, local)))
            } else {
                Ok(remote)
            }
        }
    }
}

/// Strategies this configuration could run, with the active one marked
pub fn catalog(config: &ServiceConfig, active: &str) -> Vec<BackendInfo> {
    let mut entries = vec![BackendInfo {
        name: LocalBackend::NAME,
        description: LocalBackend::DESCRIPTION,
        active: active == LocalBackend::NAME,
    }];

    if config.backend_url.is_some() {
        entries.push(BackendInfo {
            name: RemoteBackend::NAME,
            description: RemoteBackend::DESCRIPTION,
            active: active == RemoteBackend::NAME,
        });
        entries.push(BackendInfo {
            name: FallbackBackend::NAME,
            description: FallbackBackend::DESCRIPTION,
            active: active == FallbackBackend::NAME,
        });
    }

    entries
}
