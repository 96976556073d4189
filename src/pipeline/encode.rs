//! `EncodedImage`: image bytes plus media type, carried as a data URI.
//!
//! Image APIs take images as base64 inside a JSON body. Browsers and
//! clipboards hand them over as `data:<mime>;base64,<payload>` strings.
//! `EncodedImage` keeps raw bytes in memory and converts to either form when
//! needed.
//!
//! The payload sits behind an `Arc<[u8]>`, so cloning an image into a history
//! record or a result slot never copies the pixels.

use crate::error::ColoriFxError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, ImageReader};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

static RE_DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:(?P<mime>[A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,(?P<payload>.*)$")
        .unwrap()
});

/// Encoded image bytes plus their declared media type.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    data: Arc<[u8]>,
}

impl EncodedImage {
    /// Wrap bytes without validating them. Use
    /// [`crate::pipeline::input::acquire`] for untrusted input.
    pub fn new(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The payload as standard base64, as image APIs expect it.
    pub fn base64_payload(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_payload())
    }

    /// Parse a `data:<mime>;base64,<payload>` URI. Whitespace inside the
    /// payload (line-wrapped base64) is ignored.
    pub fn from_data_uri(uri: &str) -> Result<Self, ColoriFxError> {
        let caps = RE_DATA_URI
            .captures(uri.trim())
            .ok_or_else(|| ColoriFxError::InvalidDataUri {
                reason: "expected data:<mime>;base64,<payload>".into(),
            })?;
        let payload: String = caps["payload"]
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let data = STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| ColoriFxError::InvalidDataUri {
                reason: format!("payload is not base64: {e}"),
            })?;
        Ok(Self::new(&caps["mime"], data))
    }

    /// Build from a base64 payload as returned in an API response.
    pub fn from_base64(mime_type: impl Into<String>, payload: &str) -> Result<Self, ColoriFxError> {
        let data = STANDARD
            .decode(payload.trim().as_bytes())
            .map_err(|e| ColoriFxError::InvalidDataUri {
                reason: format!("payload is not base64: {e}"),
            })?;
        Ok(Self::new(mime_type, data))
    }

    /// File extension matching the media type; `png` when unknown.
    pub fn extension(&self) -> &'static str {
        ImageFormat::from_mime_type(&self.mime_type)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("png")
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Serialize for EncodedImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_uri())
    }
}

impl<'de> Deserialize<'de> for EncodedImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EncodedImage::from_data_uri(&s).map_err(serde::de::Error::custom)
    }
}

/// Check that `bytes` hold a decodable image and return its format.
///
/// Only the header is read (format sniffing plus dimensions), which is
/// enough to reject text, truncated files and unsupported formats without
/// decoding every pixel.
pub fn sniff_image(bytes: &[u8], declared_mime: &str) -> Result<ImageFormat, ColoriFxError> {
    let fail = |reason: String| ColoriFxError::AcquisitionDecodeFailure {
        mime_type: declared_mime.to_string(),
        reason,
    };

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| fail(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| fail("unrecognised image format".into()))?;
    let (w, h) = reader.into_dimensions().map_err(|e| fail(e.to_string()))?;
    if w == 0 || h == 0 {
        return Err(fail(format!("empty image {w}x{h}")));
    }

    debug!("Sniffed {:?} image {}x{} ({} bytes)", format, w, h, bytes.len());
    Ok(format)
}
