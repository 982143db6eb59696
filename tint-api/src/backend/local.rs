//! Local tonal approximation
//!
//! No model runs here. The upload is decoded and the four appearance knobs
//! are applied in HSV space, then the result is encoded as PNG:
//!
//! - value scaled by `intensity / 100`
//! - saturation scaled by `saturation / 100`
//! - value scaled again by `1 + contrast / 100` when contrast is non-zero
//! - hue rotated by `temperature / 1000` of a full turn
//!
//! Every channel is clipped to `[0, 1]` after each step, so out-of-range
//! knob values saturate instead of wrapping.

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use std::io::Cursor;
use tint_common::ColorizationParameters;
use tracing::debug;

use super::{BackendStatus, TransformBackend, TransformOutput, TransformRequest};
use crate::error::{ColorizeError, Rejection};

/// In-process strategy; always available
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    pub const NAME: &'static str = "local";
    pub const DESCRIPTION: &'static str = "In-process tonal adjustment (no model)";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransformBackend for LocalBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    async fn transform(&self, request: TransformRequest<'_>) -> Result<TransformOutput, ColorizeError> {
        let bytes = request.image.bytes.clone();
        let parameters = request.parameters;

        // Pixel work is CPU bound; keep it off the async workers
        let encoded = tokio::task::spawn_blocking(move || adjust_encoded(&bytes, &parameters))
            .await
            .map_err(|e| ColorizeError::TransformFault(format!("local transform task failed: {}", e)))??;

        Ok(TransformOutput {
            bytes: encoded,
            media_type: "image/png".to_string(),
            produced_by: Self::NAME,
            message: None,
        })
    }

    async fn probe(&self) -> BackendStatus {
        BackendStatus::Local
    }
}

/// Decode, adjust and re-encode as PNG
fn adjust_encoded(input: &[u8], params: &ColorizationParameters) -> Result<Vec<u8>, ColorizeError> {
    let decoded = image::load_from_memory(input)
        .map_err(|e| ColorizeError::InputRejected(Rejection::Undecodable(e.to_string())))?;
    let has_alpha = decoded.color().has_alpha();

    let mut pixels = decoded.to_rgba8();
    apply_adjustments(&mut pixels, params);
    debug!(
        width = pixels.width(),
        height = pixels.height(),
        "Local adjustments applied"
    );

    let output = if has_alpha {
        DynamicImage::ImageRgba8(pixels)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(pixels).to_rgb8())
    };

    let mut encoded = Vec::new();
    output
        .write_to(&mut Cursor::new(&mut encoded), ImageOutputFormat::Png)
        .map_err(|e| ColorizeError::TransformFault(format!("PNG encode failed: {}", e)))?;
    Ok(encoded)
}

/// Multiplicative factors for one parameter set
#[derive(Debug, Clone, Copy)]
struct Factors {
    value: f64,
    saturation: f64,
    contrast: Option<f64>,
    hue_shift: f64,
}

impl Factors {
    fn from_params(params: &ColorizationParameters) -> Self {
        let contrast = params.contrast();
        Self {
            value: params.intensity() / 100.0,
            saturation: params.saturation() / 100.0,
            contrast: (contrast != 0.0).then(|| 1.0 + contrast / 100.0),
            hue_shift: params.temperature() / 100.0 * 0.1,
        }
    }

    fn is_identity(&self) -> bool {
        self.value == 1.0 && self.saturation == 1.0 && self.contrast.is_none() && self.hue_shift == 0.0
    }
}

/// Apply the knobs to every pixel in place; alpha is untouched
pub(crate) fn apply_adjustments(pixels: &mut RgbaImage, params: &ColorizationParameters) {
    let factors = Factors::from_params(params);
    if factors.is_identity() {
        return;
    }

    for pixel in pixels.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        let (mut h, mut s, mut v) = rgb_to_hsv(r, g, b);

        v = (v * factors.value).clamp(0.0, 1.0);
        s = (s * factors.saturation).clamp(0.0, 1.0);
        if let Some(contrast) = factors.contrast {
            v = (v * contrast).clamp(0.0, 1.0);
        }
        if factors.hue_shift != 0.0 {
            h = (h + factors.hue_shift).rem_euclid(1.0);
        }

        let (r, g, b) = hsv_to_rgb(h, s, v);
        pixel.0[0] = r;
        pixel.0[1] = g;
        pixel.0[2] = b;
    }
}

/// RGB (0-255) to HSV with every component in `[0, 1]`
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max } else { 0.0 };
    if delta == 0.0 {
        return (0.0, s, max);
    }

    let h = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    (h / 6.0, s, max)
}

/// HSV with every component in `[0, 1]` back to RGB (0-255)
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector as u8 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    (to_channel(r), to_channel(g), to_channel(b))
}

fn to_channel(x: f64) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}
