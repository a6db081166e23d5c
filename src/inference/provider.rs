//! Model provider seam
//!
//! The multimodal runtime is reached only through this trait: one call to
//! obtain a model handle, one call to generate text from an image and prompt.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::storage::StorageError;
use crate::types::InferenceRequest;

/// Receives fractional load progress in `[0.0, 1.0]`. May be called from any thread.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Model acquisition failures
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Download failed: {0}")]
    Download(String),
    #[error("Model files are unusable: {0}")]
    Corrupted(String),
    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Generation failures
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Generation timed out")]
    Timeout,
    #[error("Provider error: {0}")]
    Provider(String),
}

/// A multimodal model runtime
#[async_trait]
pub trait ModelProvider: Send + Sync + 'static {
    /// Loaded weights, tokenizer and processor. Immutable once created.
    type Handle: Send + Sync + 'static;

    /// Fetch and load `model_id`, reporting progress along the way.
    async fn load(
        &self,
        model_id: &str,
        on_progress: ProgressCallback,
    ) -> Result<Self::Handle, LoadError>;

    /// Run one generation and return the raw output text.
    async fn generate(
        &self,
        handle: &Self::Handle,
        request: &InferenceRequest,
    ) -> Result<String, GenerationError>;
}
