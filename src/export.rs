//! Export of the displayed result to disk.
//!
//! Writes are atomic: the bytes go to a sibling temp file that is renamed
//! into place, so an interrupted export never leaves a truncated image
//! behind.

use crate::error::ColoriFxError;
use crate::pipeline::encode::EncodedImage;
use std::path::{Path, PathBuf};
use tracing::info;

/// Resolve where an export should land.
///
/// * `None` → `./<stem>.<ext>`
/// * an existing directory → `<dir>/<stem>.<ext>`
/// * anything else → used as the file path verbatim
///
/// `<ext>` follows the image's media type, so a PNG result is saved as PNG.
pub fn export_path(dest: Option<&Path>, stem: &str, image: &EncodedImage) -> PathBuf {
    let file_name = format!("{stem}.{}", image.extension());
    match dest {
        None => PathBuf::from(file_name),
        Some(p) if p.is_dir() => p.join(file_name),
        Some(p) => p.to_path_buf(),
    }
}

/// Write `image` to `path` atomically, creating parent directories.
pub async fn write_image(image: &EncodedImage, path: &Path) -> Result<(), ColoriFxError> {
    let fail = |source: std::io::Error| ColoriFxError::ExportWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = path.with_extension(format!("{}.tmp", image.extension()));
    tokio::fs::write(&tmp_path, image.bytes()).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;

    info!("Exported {} bytes to {}", image.len(), path.display());
    Ok(())
}
