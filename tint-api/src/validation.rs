//! Upload validation
//!
//! Runs before any scratch space is touched: a rejected upload never
//! creates a scope or an artifact.

use tint_common::config::ServiceConfig;
use tracing::debug;

use crate::error::Rejection;

/// An image submitted by a caller
///
/// Owned by the request; the bytes are dropped when the request's scope
/// closes.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    /// Declared content type as sent by the client
    pub content_type: String,
    pub filename: String,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            filename: filename.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Content type lowercased with any `; param` suffix removed
    pub fn media_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// Checks type family, size and allow-list, in that order
#[derive(Debug, Clone)]
pub struct ImageValidator {
    max_bytes: usize,
    allowed_types: Vec<String>,
}

impl ImageValidator {
    pub fn new(max_bytes: usize, allowed_types: Vec<String>) -> Self {
        Self {
            max_bytes,
            allowed_types,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.max_upload_bytes, config.allowed_types.clone())
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate an upload; no side effects
    pub fn validate(&self, upload: &UploadedImage) -> Result<(), Rejection> {
        let media_type = upload.media_type();

        if !media_type.starts_with("image/") {
            return Err(Rejection::NotAnImage {
                content_type: upload.content_type.clone(),
            });
        }

        if upload.size() > self.max_bytes {
            debug!(size = upload.size(), limit = self.max_bytes, "Upload over size limit");
            return Err(Rejection::TooLarge {
                limit: self.max_bytes,
            });
        }

        if !self.allowed_types.iter().any(|allowed| *allowed == media_type) {
            return Err(Rejection::UnsupportedFormat {
                content_type: upload.content_type.clone(),
                supported: self.supported_formats(),
            });
        }

        Ok(())
    }

    /// Allow-list rendered for humans, e.g. "JPG, PNG, WEBP"
    pub fn supported_formats(&self) -> String {
        self.allowed_types
            .iter()
            .map(|t| match t.as_str() {
                "image/jpeg" | "image/jpg" => "JPG".to_string(),
                other => other.trim_start_matches("image/").to_ascii_uppercase(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ImageValidator {
        ImageValidator::from_config(&ServiceConfig::default())
    }

    fn upload(content_type: &str, size: usize) -> UploadedImage {
        UploadedImage::new(vec![0u8; size], content_type, "photo")
    }

    #[test]
    fn test_accepts_allowed_types() {
        for content_type in ["image/jpeg", "image/png", "image/webp", "IMAGE/PNG; q=1"] {
            assert!(validator().validate(&upload(content_type, 1024)).is_ok(), "{}", content_type);
        }
    }

    #[test]
    fn test_rejects_non_image_family() {
        for content_type in ["text/plain", "application/octet-stream", "", "imagepng"] {
            let result = validator().validate(&upload(content_type, 16));
            assert!(
                matches!(result, Err(Rejection::NotAnImage { .. })),
                "{:?} should be rejected",
                content_type
            );
        }
    }

    #[test]
    fn test_family_check_runs_before_size_check() {
        let result = validator().validate(&upload("text/plain", 20 * 1024 * 1024));
        assert!(matches!(result, Err(Rejection::NotAnImage { .. })));
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let limit = 10 * 1024 * 1024;
        assert!(validator().validate(&upload("image/png", limit)).is_ok());
        assert_eq!(
            validator().validate(&upload("image/png", limit + 1)),
            Err(Rejection::TooLarge { limit })
        );
    }

    #[test]
    fn test_size_check_runs_before_allow_list() {
        let result = validator().validate(&upload("image/gif", 11 * 1024 * 1024));
        assert!(matches!(result, Err(Rejection::TooLarge { .. })));
    }

    #[test]
    fn test_rejects_image_types_outside_allow_list() {
        let result = validator().validate(&upload("image/gif", 64));
        match result {
            Err(Rejection::UnsupportedFormat { supported, .. }) => {
                assert_eq!(supported, "JPG, PNG, WEBP");
            }
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }
}
