//! Test helper modules for tint-api integration tests
//!
//! - Image fixtures generated with the `image` crate
//! - Multipart request builder
//! - Scripted backends (counting, failing, panicking, slow, scope-clobbering)
//! - A fake remote colorization service on an ephemeral port

#![allow(dead_code)]

pub mod fake_remote;

pub use fake_remote::{closed_port_url, spawn_fake_remote, FakeBehavior, FakeRemote};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tint_api::backend::{TransformBackend, TransformOutput, TransformRequest};
use tint_api::ColorizeError;
use tint_common::config::ServiceConfig;

/// Gradient test image encoded in `format`
pub fn encoded_image(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded_image(width, height, ImageOutputFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encoded_image(width, height, ImageOutputFormat::Jpeg(85))
}

/// Default config rooted at a test scratch directory
pub fn test_config(scratch_dir: &Path) -> ServiceConfig {
    ServiceConfig {
        scratch_dir: scratch_dir.to_path_buf(),
        ..ServiceConfig::default()
    }
}

/// Number of entries left under the scratch root
pub fn scratch_entries(scratch_dir: &Path) -> usize {
    std::fs::read_dir(scratch_dir).map(|d| d.count()).unwrap_or(0)
}

pub const BOUNDARY: &str = "tint-test-boundary-7MA4YWxkTrZu0gW";

/// Builds `multipart/form-data` bodies by hand
#[derive(Default)]
pub struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, content_type: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// Wraps another backend and counts invocations
pub struct CountingBackend {
    inner: Arc<dyn TransformBackend>,
    calls: AtomicUsize,
}

impl CountingBackend {
    pub fn new(inner: Arc<dyn TransformBackend>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransformBackend for CountingBackend {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn description(&self) -> &'static str {
        "counting wrapper"
    }

    async fn transform(&self, request: TransformRequest<'_>) -> Result<TransformOutput, ColorizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.transform(request).await
    }
}

/// Always fails with the error `make` returns
pub struct FailingBackend {
    make: fn() -> ColorizeError,
}

impl FailingBackend {
    pub fn new(make: fn() -> ColorizeError) -> Arc<Self> {
        Arc::new(Self { make })
    }
}

#[async_trait]
impl TransformBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn description(&self) -> &'static str {
        "always fails"
    }

    async fn transform(&self, _request: TransformRequest<'_>) -> Result<TransformOutput, ColorizeError> {
        Err((self.make)())
    }
}

/// Panics mid-transform
pub struct PanickingBackend;

#[async_trait]
impl TransformBackend for PanickingBackend {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn description(&self) -> &'static str {
        "panics"
    }

    async fn transform(&self, _request: TransformRequest<'_>) -> Result<TransformOutput, ColorizeError> {
        panic!("model weights missing");
    }
}

/// Sleeps far longer than any test waits
pub struct StallingBackend;

#[async_trait]
impl TransformBackend for StallingBackend {
    fn name(&self) -> &'static str {
        "stalling"
    }

    fn description(&self) -> &'static str {
        "never finishes in time"
    }

    async fn transform(&self, _request: TransformRequest<'_>) -> Result<TransformOutput, ColorizeError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ColorizeError::TransformFault("unreachable".into()))
    }
}

/// Replaces the open scope directory with a plain file, then fails
///
/// Release of that scope can no longer remove its artifacts.
pub struct ScopeClobberingBackend {
    scratch_root: PathBuf,
}

impl ScopeClobberingBackend {
    pub fn new(scratch_root: &Path) -> Arc<Self> {
        Arc::new(Self {
            scratch_root: scratch_root.to_path_buf(),
        })
    }
}

#[async_trait]
impl TransformBackend for ScopeClobberingBackend {
    fn name(&self) -> &'static str {
        "clobbering"
    }

    fn description(&self) -> &'static str {
        "breaks its own scope"
    }

    async fn transform(&self, _request: TransformRequest<'_>) -> Result<TransformOutput, ColorizeError> {
        for entry in std::fs::read_dir(&self.scratch_root).unwrap() {
            let dir = entry.unwrap().path();
            std::fs::remove_dir_all(&dir).unwrap();
            std::fs::write(&dir, b"not a directory").unwrap();
        }
        Err(ColorizeError::BackendUnavailable("Model not loaded".into()))
    }
}
