//! `data:` URL encoding and decoding for image payloads

use base64::{engine::general_purpose::STANDARD, Engine};

/// Encode bytes as `data:<media_type>;base64,<payload>`
pub fn encode(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Image bytes recovered from a backend reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    /// Media type declared by the reference, if any
    pub media_type: Option<String>,
}

/// Decode a `data:` URL or a bare base64 string
///
/// Only base64 data URLs are accepted; percent-encoded ones are not used
/// for binary images.
pub fn decode(reference: &str) -> Result<DecodedImage, String> {
    let reference = reference.trim();

    let Some(rest) = reference.strip_prefix("data:") else {
        let bytes = STANDARD
            .decode(reference)
            .map_err(|e| format!("not a data URL or base64 payload: {}", e))?;
        return Ok(DecodedImage {
            bytes,
            media_type: None,
        });
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URL has no payload separator".to_string())?;
    let media = header
        .strip_suffix(";base64")
        .ok_or_else(|| "data URL is not base64 encoded".to_string())?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| format!("invalid base64 payload: {}", e))?;
    let media_type = match media.split(';').next().unwrap_or_default().trim() {
        "" => None,
        m => Some(m.to_ascii_lowercase()),
    };

    Ok(DecodedImage { bytes, media_type })
}

/// File extension for an image media type
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}
