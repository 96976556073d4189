//! The transformation workflow: one session's state machine.
//!
//! ```text
//!            acquire                 transform
//!   Empty ───────────▶ Loaded ─────────────────▶ Processing
//!     ▲                 │  ▲                      │      │
//!     └──── reset ──────┘  └── Failed ◀── error ──┘      │ result (+400 ms)
//!     ▲                                                  ▼
//!     └──────────────── reset ─────────────────────── Completed ──┐
//!                                                        ▲         │ transform
//!                         open history record (any) ─────┘         ▼
//!                                                              Processing
//! ```
//!
//! The session state sits behind a `std::sync::Mutex` that is only held for
//! the synchronous part of each step and never across the restoration call,
//! so every transition is atomic and `transform` can refuse a second request
//! while the first is still pending. Observer callbacks are dispatched after
//! the lock is released.
//!
//! A transform future that is dropped before it finishes (a timeout, a
//! losing `select!` branch, an aborted task) takes the session back to
//! `Loaded` with the original kept and the progress reset.

use crate::config::RestorationConfig;
use crate::error::ColoriFxError;
use crate::export;
use crate::history::{HistoryStore, TransformationRecord};
use crate::observer::{NoopObserver, SharedObserver};
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::input::{self, PasteEvent};
use crate::pipeline::restore::RestorationClient;
use crate::progress::ProgressSimulator;
use crate::prompts::{Preset, DEFAULT_INSTRUCTION_LABEL};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// Generic text shown to the user when a restoration fails.
pub const FAILURE_NOTICE: &str = "Restoration failed. Make sure the image is clearly readable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WorkflowState {
    #[default]
    Empty,
    Loaded,
    Processing,
    Completed,
    /// Transient: reported to observers, then immediately `Loaded`.
    Failed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Empty => "empty",
            WorkflowState::Loaded => "loaded",
            WorkflowState::Processing => "processing",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Which view the presentation layer is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum View {
    #[default]
    Editor,
    History,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            View::Editor => "editor",
            View::History => "history",
        })
    }
}

#[derive(Debug, Default)]
struct Session {
    state: WorkflowState,
    original: Option<EncodedImage>,
    result: Option<EncodedImage>,
    instruction: String,
    view: View,
    history: HistoryStore,
}

type Transitions = Vec<(WorkflowState, WorkflowState)>;

impl Session {
    fn set_state(&mut self, to: WorkflowState, out: &mut Transitions) {
        let from = self.state;
        if from != to {
            self.state = to;
            out.push((from, to));
        }
    }
}

/// One user session: current image pair, instruction field, view, history
/// and the restoration backend.
///
/// Share it with `Arc`; every method takes `&self`.
pub struct TransformationWorkflow {
    client: Arc<dyn RestorationClient>,
    config: RestorationConfig,
    session: Mutex<Session>,
    progress: ProgressSimulator,
    observer: SharedObserver,
}

impl TransformationWorkflow {
    pub fn new(client: Arc<dyn RestorationClient>, config: RestorationConfig) -> Self {
        let progress = ProgressSimulator::new(config.tick_interval());
        Self {
            client,
            config,
            session: Mutex::new(Session::default()),
            progress,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &RestorationConfig {
        &self.config
    }

    // ── Read side ────────────────────────────────────────────────────────

    pub fn state(&self) -> WorkflowState {
        self.lock().state
    }

    pub fn progress(&self) -> f32 {
        self.progress.current()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f32> {
        self.progress.subscribe()
    }

    pub fn progress_stream(&self) -> WatchStream<f32> {
        self.progress.stream()
    }

    pub fn original(&self) -> Option<EncodedImage> {
        self.lock().original.clone()
    }

    pub fn result(&self) -> Option<EncodedImage> {
        self.lock().result.clone()
    }

    pub fn instruction(&self) -> String {
        self.lock().instruction.clone()
    }

    pub fn set_instruction(&self, text: impl Into<String>) {
        self.lock().instruction = text.into();
    }

    pub fn view(&self) -> View {
        self.lock().view
    }

    pub fn set_view(&self, view: View) {
        self.lock().view = view;
    }

    /// Snapshot of the history, newest first.
    pub fn history(&self) -> Vec<TransformationRecord> {
        self.lock().history.list_all()
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn record(&self, id: &str) -> Result<TransformationRecord, ColoriFxError> {
        self.lock().history.get(id).cloned()
    }

    // ── Acquisition ──────────────────────────────────────────────────────

    /// Make `image` the current original. Any previous result is discarded.
    ///
    /// The image is trusted as-is; untrusted bytes go through
    /// [`Self::acquire`] or [`Self::handle_paste`].
    pub fn load_image(&self, image: EncodedImage) -> Result<(), ColoriFxError> {
        let mut events = Transitions::new();
        {
            let mut s = self.lock();
            if s.state == WorkflowState::Processing {
                return Err(ColoriFxError::RequestAlreadyInFlight);
            }
            debug!("Loaded {} ({} bytes)", image.mime_type(), image.len());
            s.original = Some(image);
            s.result = None;
            s.set_state(WorkflowState::Loaded, &mut events);
        }
        self.notify(events);
        Ok(())
    }

    /// Acquire raw bytes from a file selection. Undecodable input is dropped
    /// silently; returns whether an image was loaded.
    pub fn acquire(&self, bytes: Vec<u8>, declared_mime: &str) -> bool {
        match input::acquire(bytes, declared_mime) {
            Ok(image) => self.load_image(image).is_ok(),
            Err(e) => {
                debug!("Acquisition ignored: {}", e);
                false
            }
        }
    }

    /// Read and load an image file. Unlike [`Self::acquire`], failures are
    /// returned so a command-line caller can report them.
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<(), ColoriFxError> {
        let image = input::acquire_from_file(path).await?;
        self.load_image(image)
    }

    /// Dispatch a clipboard paste. Events without a decodable image are
    /// ignored. On success the presentation layer is told to show the editor
    /// if it was elsewhere.
    pub fn handle_paste(&self, event: &PasteEvent) -> bool {
        let Some(image) = input::acquire_from_paste(event) else {
            return false;
        };
        if self.load_image(image).is_err() {
            return false;
        }
        let switched = {
            let mut s = self.lock();
            if s.view != View::Editor {
                s.view = View::Editor;
                true
            } else {
                false
            }
        };
        if switched {
            self.observer.on_view_switch(View::Editor);
        }
        true
    }

    /// Clear the image pair and the instruction field. A no-op while a
    /// request is in flight; returns whether the reset happened.
    pub fn reset(&self) -> bool {
        let mut events = Transitions::new();
        {
            let mut s = self.lock();
            if s.state == WorkflowState::Processing {
                return false;
            }
            s.original = None;
            s.result = None;
            s.instruction.clear();
            s.set_state(WorkflowState::Empty, &mut events);
        }
        self.notify(events);
        true
    }

    // ── Transformation ───────────────────────────────────────────────────

    /// Restore the current image using the instruction field.
    pub async fn transform(&self) -> Result<TransformationRecord, ColoriFxError> {
        self.run(None, false).await
    }

    /// Restore the current image using `instruction`, or the instruction
    /// field when `instruction` is empty.
    pub async fn transform_with(&self, instruction: &str) -> Result<TransformationRecord, ColoriFxError> {
        self.run(Some(instruction), false).await
    }

    /// Put the preset's text into the instruction field and restore with it.
    pub async fn apply_preset(&self, preset: &Preset) -> Result<TransformationRecord, ColoriFxError> {
        info!("Applying preset '{}'", preset.label);
        self.run(Some(preset.prompt), true).await
    }

    async fn run(
        &self,
        override_text: Option<&str>,
        store_in_field: bool,
    ) -> Result<TransformationRecord, ColoriFxError> {
        let mut events = Transitions::new();
        let (original, instruction) = {
            let mut s = self.lock();
            if s.state == WorkflowState::Processing {
                return Err(ColoriFxError::RequestAlreadyInFlight);
            }
            let original = s.original.clone().ok_or(ColoriFxError::NoImageLoaded)?;
            let instruction = match override_text {
                Some(text) if !text.is_empty() => text.to_string(),
                _ => s.instruction.clone(),
            };
            if store_in_field {
                s.instruction = instruction.clone();
            }
            s.result = None;
            s.set_state(WorkflowState::Processing, &mut events);
            self.progress.start();
            (original, instruction)
        };
        self.notify(std::mem::take(&mut events));
        let mut guard = ProcessingGuard::arm(self);
        info!(
            "Restoring {} ({} bytes), instruction: {:?}",
            original.mime_type(),
            original.len(),
            instruction
        );

        match self.client.restore(&original, &instruction).await {
            Ok(result) => {
                self.progress.finish();
                tokio::time::sleep(self.config.completion_delay()).await;

                let record = {
                    let mut s = self.lock();
                    let now = Utc::now();
                    let id = s.history.next_id(now);
                    let label = if instruction.is_empty() {
                        DEFAULT_INSTRUCTION_LABEL
                    } else {
                        instruction.as_str()
                    };
                    let record = TransformationRecord::new(id, original, result.clone(), now, label);
                    s.result = Some(result);
                    s.history.append(record.clone());
                    self.progress.reset();
                    s.set_state(WorkflowState::Completed, &mut events);
                    guard.disarm();
                    record
                };
                self.notify(events);
                self.observer.on_record_added(&record);
                info!("Restoration complete: record {}", record.id());
                Ok(record)
            }
            Err(e) => {
                warn!("Restoration failed: {}", e);
                guard.disarm();
                {
                    let mut s = self.lock();
                    self.progress.reset();
                    s.result = None;
                    s.set_state(WorkflowState::Failed, &mut events);
                    s.set_state(WorkflowState::Loaded, &mut events);
                }
                self.notify(events);
                self.observer.on_failure(FAILURE_NOTICE);
                Err(if e.is_restoration_failure() {
                    e
                } else {
                    ColoriFxError::RestorationFailed {
                        message: e.to_string(),
                    }
                })
            }
        }
    }

    // ── History replay and export ────────────────────────────────────────

    /// Show a history record in the editor: its images become the current
    /// pair and the state becomes `Completed`. The instruction field is left
    /// untouched. Refused while a request is in flight.
    pub fn open_record(&self, id: &str) -> Result<TransformationRecord, ColoriFxError> {
        let mut events = Transitions::new();
        let (record, switched) = {
            let mut s = self.lock();
            if s.state == WorkflowState::Processing {
                return Err(ColoriFxError::RequestAlreadyInFlight);
            }
            let record = s.history.get(id)?.clone();
            s.original = Some(record.original().clone());
            s.result = Some(record.result().clone());
            s.set_state(WorkflowState::Completed, &mut events);
            let switched = s.view != View::Editor;
            s.view = View::Editor;
            (record, switched)
        };
        self.notify(events);
        if switched {
            self.observer.on_view_switch(View::Editor);
        }
        debug!("Opened record {}", record.id());
        Ok(record)
    }

    /// Write the displayed result to `dest` (a file, or a directory that
    /// receives the conventional export name). `None` means the current
    /// directory.
    pub async fn export_result(&self, dest: Option<&Path>) -> Result<PathBuf, ColoriFxError> {
        let image = self.result().ok_or(ColoriFxError::NoResultToExport)?;
        let path = export::export_path(dest, &self.config.export_file_stem, &image);
        export::write_image(&image, &path).await?;
        Ok(path)
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, events: Transitions) {
        for (from, to) in events {
            debug!("State {} → {}", from, to);
            self.observer.on_state_change(from, to);
        }
    }
}

/// Leaves Processing if a transform future is dropped mid-flight (timeout,
/// `select!`, task abort). The original stays loaded and no record is made.
struct ProcessingGuard<'a> {
    workflow: &'a TransformationWorkflow,
    armed: bool,
}

impl<'a> ProcessingGuard<'a> {
    fn arm(workflow: &'a TransformationWorkflow) -> Self {
        Self {
            workflow,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let wf = self.workflow;
        let mut events = Transitions::new();
        {
            let mut s = wf.lock();
            wf.progress.reset();
            if s.state == WorkflowState::Processing {
                s.result = None;
                s.set_state(WorkflowState::Loaded, &mut events);
            }
        }
        warn!("Restoration abandoned before completion");
        wf.notify(events);
    }
}
