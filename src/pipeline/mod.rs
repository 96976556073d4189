//! Pipeline stages between the user and the restoration backend.
//!
//! ## Data Flow
//!
//! ```text
//! file / paste ──▶ input ──▶ encode ──▶ restore ──▶ EncodedImage
//!                (acquire)  (data URI)  (Gemini)
//! ```
//!
//! 1. [`input`]   accept a file selection or paste event, check the media
//!    type and sniff the bytes
//! 2. [`encode`]  the `EncodedImage` type and its data-URI / base64 forms
//! 3. [`restore`] the `RestorationClient` seam and the Gemini
//!    implementation; the only stage with network I/O

pub mod encode;
pub mod input;
pub mod restore;
