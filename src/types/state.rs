//! Observable scanner state
//!
//! The record the UI renders: readiness, progress, busy flag and the last answer.

use serde::{Deserialize, Serialize};

/// Snapshot of everything an observer can see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerState {
    /// The model handle is installed. Never goes back to false.
    pub is_ready: bool,
    /// A receipt is being analysed right now
    pub is_processing: bool,
    /// Download percentage while loading, or the load error
    pub loading_progress: String,
    /// Raw model output, or the processing error
    pub result_text: String,
    /// `loading_progress` holds an error rather than progress
    pub load_failed: bool,
    /// `result_text` holds an error rather than model output
    pub result_is_error: bool,
}

impl ManagerState {
    /// Whether the "analyse" action should be enabled.
    pub fn can_process(&self) -> bool {
        self.is_ready && !self.is_processing
    }
}
