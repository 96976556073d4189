//! Error types for the colorifx library.
//!
//! Every failure the library can report is a variant of [`ColoriFxError`].
//! The variants fall into three groups, and the workflow treats each group
//! differently:
//!
//! * **Acquisition**: [`ColoriFxError::AcquisitionDecodeFailure`]. The
//!   workflow swallows these: a paste event that carries text, or a file that
//!   is not an image, must not disturb the current session.
//!
//! * **Guards**: [`ColoriFxError::NoImageLoaded`] and
//!   [`ColoriFxError::RequestAlreadyInFlight`]. The call is refused and no
//!   state changes. They are returned as `Err` so callers can decide whether
//!   to ignore them (the interactive shell does).
//!
//! * **Upstream**: [`ColoriFxError::RestorationFailed`] and
//!   [`ColoriFxError::NoImageReturned`]. Surfaced to the user as a blocking
//!   notification; the workflow falls back to the loaded original.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the colorifx library.
#[derive(Debug, Error)]
pub enum ColoriFxError {
    // ── Acquisition errors ────────────────────────────────────────────────
    /// The blob handed to an image source is not a decodable image.
    #[error("Could not decode image ({mime_type}): {reason}")]
    AcquisitionDecodeFailure { mime_type: String, reason: String },

    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// A string that should be a `data:<mime>;base64,<payload>` URI is not one.
    #[error("Invalid data URI: {reason}")]
    InvalidDataUri { reason: String },

    // ── Workflow guards ───────────────────────────────────────────────────
    /// `transform` was called with no image loaded.
    #[error("No image loaded. Open or paste a document first.")]
    NoImageLoaded,

    /// `transform` was called while another request is still pending.
    #[error("A restoration request is already in flight")]
    RequestAlreadyInFlight,

    /// No history record carries the requested id.
    #[error("No history record with id '{id}'")]
    RecordNotFound { id: String },

    /// Export was requested but there is no restored image to write.
    #[error("Nothing to export: no restored image is displayed")]
    NoResultToExport,

    // ── Restoration errors ────────────────────────────────────────────────
    /// The restoration backend is not usable (missing API key etc.).
    #[error("Restoration provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The restoration backend failed. The upstream failure taxonomy is not
    /// ours, so every cause (HTTP status, transport, timeout, garbage
    /// payload) collapses into this one kind.
    #[error("Restoration failed: {message}")]
    RestorationFailed { message: String },

    /// The backend answered, but the first candidate held no inline image.
    #[error("API did not return image data")]
    NoImageReturned,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the exported image file.
    #[error("Failed to write output file '{path}': {source}")]
    ExportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ColoriFxError {
    /// True for the upstream failures that the workflow reports to the user
    /// and recovers from by reverting to the loaded original.
    pub fn is_restoration_failure(&self) -> bool {
        matches!(
            self,
            ColoriFxError::RestorationFailed { .. } | ColoriFxError::NoImageReturned
        )
    }

    /// True for refused calls that leave the workflow untouched.
    pub fn is_guard_violation(&self) -> bool {
        matches!(
            self,
            ColoriFxError::NoImageLoaded | ColoriFxError::RequestAlreadyInFlight
        )
    }
}
