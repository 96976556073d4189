//! # colorifx
//!
//! Restore scanned and photocopied documents with a generative image model:
//! straighten the page, turn faded ink into crisp black text, remove grain,
//! and give tables a clean spreadsheet colour scheme.
//!
//! The image work itself happens in the model. This crate owns everything
//! around it: acquiring images from files or clipboard pastes, the session
//! state machine, the simulated progress shown while the single API call is
//! pending, and an in-memory history that can be replayed into the editor.
//!
//! ## Workflow Overview
//!
//! ```text
//! file / paste
//!  │
//!  ├─ 1. Acquire    media type check + header sniff      → Loaded
//!  ├─ 2. Transform  prompt template + instruction → API  → Processing
//!  │                progress 0 → 60 → 98 (simulated)
//!  ├─ 3. Result     progress 100, short pause, reveal     → Completed
//!  ├─ 4. History    record prepended, newest first
//!  └─ 5. Export     atomic write of the displayed result
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use colorifx::{GeminiRestorationClient, RestorationConfig, TransformationWorkflow};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from GEMINI_API_KEY (or API_KEY)
//!     let config = RestorationConfig::default();
//!     let client = Arc::new(GeminiRestorationClient::from_config(&config)?);
//!     let workflow = TransformationWorkflow::new(client, config);
//!
//!     workflow.load_file("scan.jpg").await?;
//!     let record = workflow.transform_with("Make it perfectly vertical").await?;
//!     let path = workflow.export_result(None).await?;
//!     eprintln!("record {} → {}", record.id(), path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `colorifx` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod observer;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RestorationConfig, RestorationConfigBuilder};
pub use error::ColoriFxError;
pub use history::{HistoryStore, TransformationRecord};
pub use observer::{NoopObserver, SharedObserver, WorkflowObserver};
pub use pipeline::encode::EncodedImage;
pub use pipeline::input::{PasteEvent, PasteItem};
pub use pipeline::restore::{GeminiRestorationClient, RestorationClient};
pub use progress::ProgressSimulator;
pub use prompts::{find_preset, Preset, PRESETS};
pub use workflow::{TransformationWorkflow, View, WorkflowState};
