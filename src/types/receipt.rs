//! Receipt scan types
//!
//! Defines what goes into a single inference call and what comes out of it.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One inference call: a bounded image, the instruction and the sampling temperature.
///
/// Built fresh for every scan and dropped when the call returns.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Identifies the scan in logs
    pub id: Uuid,
    /// Image already reduced to the configured maximum dimension
    pub image: DynamicImage,
    /// Instruction sent with the image
    pub prompt: String,
    /// Sampling temperature (0.0 = greedy decoding)
    pub temperature: f32,
}

/// Outcome of a scan. Exactly one of output or error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum InferenceResult {
    /// Raw model output, passed through without validation
    Output(String),
    /// Human-readable failure description
    Error(String),
}

impl InferenceResult {
    pub fn text(&self) -> &str {
        match self {
            Self::Output(text) | Self::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
