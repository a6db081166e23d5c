//! Scanner configuration
//!
//! The few knobs the core needs: which model to load and how large an image may get.

use serde::{Deserialize, Serialize};

use crate::imaging::DEFAULT_MAX_DIMENSION;

/// Model loaded when nothing else is configured.
pub const DEFAULT_MODEL_ID: &str = "mlx-community/DeepSeek-OCR-2-4bit";

/// Core scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Model identifier passed to the provider (HuggingFace repo id)
    pub model_id: String,
    /// Longest side, in pixels, an image may have when it reaches the model
    pub max_dimension: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl ScanConfig {
    /// Replace unusable values with defaults.
    pub fn validate(&mut self) {
        if self.model_id.trim().is_empty() {
            self.model_id = DEFAULT_MODEL_ID.to_string();
        }
        if self.max_dimension == 0 {
            self.max_dimension = DEFAULT_MAX_DIMENSION;
        }
    }
}
