//! Model types
//!
//! Describes the weights a provider fetched for a model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Information about downloaded model weights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier (HuggingFace repo id)
    pub model_id: String,
    /// Directory holding the weight files
    pub directory: PathBuf,
    /// Files belonging to the model, relative to `directory`
    pub files: Vec<String>,
    /// Total size in bytes
    pub size_bytes: u64,
}
