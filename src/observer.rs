//! Observer trait for workflow events.
//!
//! Inject an [`Arc<dyn WorkflowObserver>`] with
//! [`crate::workflow::TransformationWorkflow::with_observer`] to react to
//! state transitions, view switches, failures and new history records. This is
//! how a presentation layer (the CLI, a GUI, a web bridge) learns that it
//! should re-render, without the workflow knowing anything about rendering.
//!
//! Progress is not reported here; subscribe to
//! [`crate::workflow::TransformationWorkflow::subscribe_progress`] instead.
//!
//! # Example
//!
//! ```rust
//! use colorifx::WorkflowObserver;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failures: AtomicUsize,
//! }
//!
//! impl WorkflowObserver for FailureCounter {
//!     fn on_failure(&self, message: &str) {
//!         self.failures.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{message}");
//!     }
//! }
//!
//! let observer = Arc::new(FailureCounter { failures: AtomicUsize::new(0) });
//! observer.on_failure("Restoration failed.");
//! assert_eq!(observer.failures.load(Ordering::SeqCst), 1);
//! ```

use crate::history::TransformationRecord;
use crate::workflow::{View, WorkflowState};
use std::sync::Arc;

/// Receives workflow events.
///
/// Callbacks run synchronously on the task that caused the event, after the
/// workflow has released its lock, so they may read workflow state. All
/// methods default to no-ops.
pub trait WorkflowObserver: Send + Sync {
    /// Called after every state transition, including the transient
    /// `Processing → Failed → Loaded` pair.
    fn on_state_change(&self, from: WorkflowState, to: WorkflowState) {
        let _ = (from, to);
    }

    /// The presentation layer should show `view`.
    fn on_view_switch(&self, view: View) {
        let _ = view;
    }

    /// A restoration failed. Presentation layers should show this as a
    /// blocking notification.
    fn on_failure(&self, message: &str) {
        let _ = message;
    }

    /// A completed transformation was prepended to the history.
    fn on_record_added(&self, record: &TransformationRecord) {
        let _ = record;
    }
}

/// A no-op implementation; the default when no observer is configured.
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

/// Convenience alias for the type stored in the workflow.
pub type SharedObserver = Arc<dyn WorkflowObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        transitions: Mutex<Vec<(WorkflowState, WorkflowState)>>,
        views: Mutex<Vec<View>>,
    }

    impl WorkflowObserver for Recorder {
        fn on_state_change(&self, from: WorkflowState, to: WorkflowState) {
            self.transitions.lock().unwrap().push((from, to));
        }

        fn on_view_switch(&self, view: View) {
            self.views.lock().unwrap().push(view);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_state_change(WorkflowState::Empty, WorkflowState::Loaded);
        obs.on_view_switch(View::Editor);
        obs.on_failure("boom");
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_state_change(WorkflowState::Loaded, WorkflowState::Processing);
        rec.on_view_switch(View::History);
        rec.on_failure("ignored by default impl");

        assert_eq!(
            *rec.transitions.lock().unwrap(),
            vec![(WorkflowState::Loaded, WorkflowState::Processing)]
        );
        assert_eq!(*rec.views.lock().unwrap(), vec![View::History]);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: SharedObserver = Arc::new(NoopObserver);
        obs.on_state_change(WorkflowState::Processing, WorkflowState::Completed);
    }
}
