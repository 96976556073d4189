//! Image acquisition: normalise a file selection or a clipboard paste into an
//! [`EncodedImage`].
//!
//! Both channels end in [`acquire`], which checks the declared media type and
//! sniffs the bytes before anything reaches the workflow. A paste event may
//! carry several items (plain text, HTML, an image); only image items are
//! considered and the first one that decodes wins.

use crate::error::ColoriFxError;
use crate::pipeline::encode::{sniff_image, EncodedImage};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One item of a clipboard transfer.
#[derive(Debug, Clone)]
pub struct PasteItem {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PasteItem {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Whether the item's transfer type names an image.
    pub fn is_image(&self) -> bool {
        self.mime_type.contains("image")
    }
}

/// A clipboard paste event: the transferred items in clipboard order.
#[derive(Debug, Clone, Default)]
pub struct PasteEvent {
    pub items: Vec<PasteItem>,
}

impl PasteEvent {
    pub fn new(items: Vec<PasteItem>) -> Self {
        Self { items }
    }

    /// Convenience for the common single-image paste.
    pub fn image(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(vec![PasteItem::new(mime_type, bytes)])
    }

    pub fn text(text: &str) -> Self {
        Self::new(vec![PasteItem::new("text/plain", text.as_bytes().to_vec())])
    }
}

/// Normalise raw bytes with a declared media type into an [`EncodedImage`].
///
/// The declared type must name an image and the bytes must sniff as one.
/// When the declared type disagrees with the sniffed format (a PNG saved as
/// `scan.jpg`), the sniffed type wins.
pub fn acquire(bytes: Vec<u8>, declared_mime: &str) -> Result<EncodedImage, ColoriFxError> {
    if !declared_mime.contains("image") {
        return Err(ColoriFxError::AcquisitionDecodeFailure {
            mime_type: declared_mime.to_string(),
            reason: "not an image media type".into(),
        });
    }
    let format = sniff_image(&bytes, declared_mime)?;
    let mime = if ImageFormat::from_mime_type(declared_mime) == Some(format) {
        declared_mime
    } else {
        let sniffed = format.to_mime_type();
        debug!("Declared {} but bytes are {}", declared_mime, sniffed);
        sniffed
    };
    Ok(EncodedImage::new(mime, bytes))
}

/// Acquire the first decodable image item of a paste event.
///
/// Returns `None` when the event carries no usable image (e.g. pasted text).
pub fn acquire_from_paste(event: &PasteEvent) -> Option<EncodedImage> {
    event
        .items
        .iter()
        .filter(|item| item.is_image())
        .find_map(|item| match acquire(item.bytes.clone(), &item.mime_type) {
            Ok(img) => Some(img),
            Err(e) => {
                debug!("Ignoring paste item: {}", e);
                None
            }
        })
}

/// Media type for a selected file: from its extension, else from its bytes.
pub fn mime_for_file(path: &Path, bytes: &[u8]) -> Option<&'static str> {
    ImageFormat::from_path(path)
        .ok()
        .or_else(|| image::guess_format(bytes).ok())
        .map(|f| f.to_mime_type())
}

/// Read a selected file from disk and acquire it.
pub async fn acquire_from_file(path: impl AsRef<Path>) -> Result<EncodedImage, ColoriFxError> {
    let path = path.as_ref();
    let bytes = read_file(path).await?;
    let mime = mime_for_file(path, &bytes).unwrap_or("application/octet-stream");
    let img = acquire(bytes, mime)?;
    debug!("Acquired {} ({}, {} bytes)", path.display(), img.mime_type(), img.len());
    Ok(img)
}

/// Read a file, mapping I/O failures onto [`ColoriFxError`].
pub async fn read_file(path: &Path) -> Result<Vec<u8>, ColoriFxError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ColoriFxError::FileNotFound {
            path: PathBuf::from(path),
        },
        std::io::ErrorKind::PermissionDenied => ColoriFxError::PermissionDenied {
            path: PathBuf::from(path),
        },
        _ => ColoriFxError::Internal(format!("reading {}: {e}", path.display())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::tests::png_bytes;
    use std::io::Write;

    #[test]
    fn acquire_accepts_real_png() {
        let bytes = png_bytes(2, 2, [10, 20, 30, 255]);
        let img = acquire(bytes.clone(), "image/png").unwrap();
        assert_eq!(img.mime_type(), "image/png");
        assert_eq!(img.bytes(), &bytes[..]);
    }

    #[test]
    fn acquire_prefers_sniffed_type_over_declared() {
        let bytes = png_bytes(2, 2, [10, 20, 30, 255]);
        let img = acquire(bytes.clone(), "image/jpeg").unwrap();
        assert_eq!(img.mime_type(), "image/png");
        assert_eq!(img.extension(), "png");
        assert_eq!(acquire(bytes, "image/webp").unwrap().mime_type(), "image/png");
    }

    #[test]
    fn acquire_rejects_non_image_mime() {
        let err = acquire(png_bytes(1, 1, [0, 0, 0, 255]), "text/plain").unwrap_err();
        assert!(matches!(err, ColoriFxError::AcquisitionDecodeFailure { .. }));
    }

    #[test]
    fn acquire_rejects_undecodable_bytes() {
        let err = acquire(b"IMGA".to_vec(), "image/png").unwrap_err();
        assert!(matches!(err, ColoriFxError::AcquisitionDecodeFailure { .. }));
    }

    #[test]
    fn paste_of_text_yields_nothing() {
        assert!(acquire_from_paste(&PasteEvent::text("hello")).is_none());
        assert!(acquire_from_paste(&PasteEvent::default()).is_none());
    }

    #[test]
    fn paste_skips_text_and_broken_items() {
        let good = png_bytes(1, 1, [1, 2, 3, 255]);
        let event = PasteEvent::new(vec![
            PasteItem::new("text/html", b"<img>".to_vec()),
            PasteItem::new("image/png", b"truncated".to_vec()),
            PasteItem::new("image/png", good.clone()),
        ]);
        let img = acquire_from_paste(&event).unwrap();
        assert_eq!(img.bytes(), &good[..]);
    }

    #[test]
    fn mime_from_extension_then_bytes() {
        let png = png_bytes(1, 1, [0, 0, 0, 255]);
        assert_eq!(mime_for_file(Path::new("scan.jpg"), &png), Some("image/jpeg"));
        assert_eq!(mime_for_file(Path::new("scan"), &png), Some("image/png"));
        assert_eq!(mime_for_file(Path::new("notes"), b"text"), None);
    }

    #[tokio::test]
    async fn acquire_from_file_reads_and_validates() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(&png_bytes(5, 5, [9, 9, 9, 255])).unwrap();
        let img = acquire_from_file(tmp.path()).await.unwrap();
        assert_eq!(img.mime_type(), "image/png");
    }

    #[tokio::test]
    async fn misnamed_file_keeps_its_real_type() {
        let mut tmp = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        tmp.write_all(&png_bytes(3, 3, [1, 1, 1, 255])).unwrap();
        let img = acquire_from_file(tmp.path()).await.unwrap();
        assert_eq!(img.mime_type(), "image/png");
    }

    #[tokio::test]
    async fn acquire_from_missing_file() {
        let err = acquire_from_file("/definitely/not/here.png").await.unwrap_err();
        assert!(matches!(err, ColoriFxError::FileNotFound { .. }));
    }
}
