//! State store with change notification
//!
//! Holds the single `ManagerState` and broadcasts a snapshot after every change.
//! Mutators are crate-private: only acquisition and inference write here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::types::{InferenceResult, ManagerState};

/// Snapshots buffered per subscriber before it starts lagging.
const CHANGE_BUFFER: usize = 64;

pub struct StateStore {
    state: Mutex<ManagerState>,
    changes: broadcast::Sender<ManagerState>,
}

impl StateStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            state: Mutex::new(ManagerState::default()),
            changes,
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> ManagerState {
        self.lock().clone()
    }

    /// Receive one snapshot per change, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerState> {
        self.changes.subscribe()
    }

    pub(crate) fn begin_loading(&self) {
        self.update(|state| {
            state.loading_progress.clear();
            state.load_failed = false;
        });
    }

    pub(crate) fn set_progress(&self, progress: String) {
        self.update(|state| {
            if !state.is_ready {
                state.loading_progress = progress;
            }
        });
    }

    pub(crate) fn mark_ready(&self) {
        self.update(|state| {
            state.is_ready = true;
            state.loading_progress.clear();
            state.load_failed = false;
        });
    }

    /// A load was dropped before it settled: back to idle, no stale percentage.
    pub(crate) fn abandon_loading(&self) {
        self.update(|state| {
            if !state.is_ready {
                state.loading_progress.clear();
                state.load_failed = false;
            }
        });
    }

    pub(crate) fn fail_loading(&self, message: String) {
        self.update(|state| {
            state.loading_progress = message;
            state.load_failed = true;
        });
    }

    /// Enter processing and drop the previous answer in one notification.
    ///
    /// Refused until the model is ready, so `is_processing` never shows up
    /// without `is_ready`.
    pub(crate) fn begin_processing(&self) -> bool {
        let mut entered = false;
        self.update(|state| {
            if !state.is_ready {
                return;
            }
            entered = true;
            state.is_processing = true;
            state.result_text.clear();
            state.result_is_error = false;
        });
        entered
    }

    pub(crate) fn set_result(&self, result: &InferenceResult) {
        self.update(|state| {
            state.result_text = result.text().to_string();
            state.result_is_error = result.is_error();
        });
    }

    /// Leave processing and release `in_flight` under the same lock, so an
    /// observer woken by `is_processing = false` can start the next scan.
    pub(crate) fn end_processing(&self, in_flight: &AtomicBool) {
        self.update(|state| {
            state.is_processing = false;
            in_flight.store(false, Ordering::Release);
        });
    }

    /// Returns false while a scan is running.
    pub(crate) fn clear_result(&self) -> bool {
        let mut cleared = true;
        self.update(|state| {
            if state.is_processing {
                cleared = false;
                return;
            }
            state.result_text.clear();
            state.result_is_error = false;
        });
        cleared
    }

    fn update(&self, apply: impl FnOnce(&mut ManagerState)) {
        let snapshot = {
            let mut state = self.lock();
            let before = state.clone();
            apply(&mut state);
            if *state == before {
                return;
            }
            state.clone()
        };
        // No subscribers is fine
        let _ = self.changes.send(snapshot);
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
