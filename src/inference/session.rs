//! Receipt inference session
//!
//! Single-flight: one scan at a time. A call that arrives while another is in
//! flight is rejected with [`ProcessOutcome::Busy`] and leaves state alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use thiserror::Error;

use crate::imaging::{decode_image, resize_bounded};
use crate::inference::acquisition::ModelSlot;
use crate::inference::prompt::receipt_request;
use crate::inference::provider::{GenerationError, ModelProvider};
use crate::state::StateStore;
use crate::types::InferenceResult;

/// What a call to [`InferenceSession::process_receipt`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No model loaded yet; nothing changed
    NotReady,
    /// Another scan is running; nothing changed
    Busy,
    /// The scan ran; the result is also in `result_text`
    Completed(InferenceResult),
}

/// Image as handed over by the capture side
#[derive(Debug, Clone)]
pub enum ReceiptImage {
    Decoded(DynamicImage),
    Encoded(Vec<u8>),
}

impl From<DynamicImage> for ReceiptImage {
    fn from(image: DynamicImage) -> Self {
        Self::Decoded(image)
    }
}

impl From<Vec<u8>> for ReceiptImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Encoded(bytes)
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

pub struct InferenceSession<P: ModelProvider> {
    provider: Arc<P>,
    slot: ModelSlot<P::Handle>,
    state: Arc<StateStore>,
    max_dimension: u32,
    in_flight: AtomicBool,
}

impl<P: ModelProvider> InferenceSession<P> {
    pub fn new(
        provider: Arc<P>,
        slot: ModelSlot<P::Handle>,
        state: Arc<StateStore>,
        max_dimension: u32,
    ) -> Self {
        Self {
            provider,
            slot,
            state,
            max_dimension,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Scan one receipt and publish the raw model output (or an error) as `result_text`.
    ///
    /// `is_processing` is reset on every exit path, including panics and a
    /// dropped future. The model handle stays usable after a failure.
    pub async fn process_receipt(&self, image: impl Into<ReceiptImage>) -> ProcessOutcome {
        let Some(handle) = self.slot.get() else {
            tracing::debug!("Ignoring scan request: model not loaded");
            return ProcessOutcome::NotReady;
        };

        let _in_flight = match InFlight::enter(&self.in_flight, &self.state) {
            Ok(guard) => guard,
            Err(ProcessOutcome::Busy) => {
                tracing::warn!("Ignoring scan request: another scan is running");
                return ProcessOutcome::Busy;
            }
            Err(outcome) => {
                tracing::debug!("Ignoring scan request: model not published as ready");
                return outcome;
            }
        };

        let result = match self.run(handle, image.into()).await {
            Ok(output) => InferenceResult::Output(output),
            Err(e) => {
                tracing::error!("Receipt scan failed: {}", e);
                InferenceResult::Error(format!("Error al procesar la imagen: {}", e))
            }
        };
        self.state.set_result(&result);

        ProcessOutcome::Completed(result)
    }

    async fn run(&self, handle: &P::Handle, image: ReceiptImage) -> Result<String, ScanError> {
        let max_dimension = self.max_dimension;
        let safe_image = tokio::task::spawn_blocking(move || {
            let image = match image {
                ReceiptImage::Decoded(image) => image,
                ReceiptImage::Encoded(bytes) => decode_image(&bytes)?,
            };
            Ok::<_, ScanError>(resize_bounded(image, max_dimension))
        })
        .await
        .map_err(|e| ScanError::Preprocess(e.to_string()))??;

        let request = receipt_request(safe_image);
        tracing::info!(
            id = %request.id,
            "Scanning receipt {}x{}",
            request.image.width(),
            request.image.height()
        );

        let output = self.provider.generate(handle, &request).await?;
        tracing::info!(id = %request.id, "Scan finished ({} chars)", output.len());
        Ok(output)
    }
}

/// Holds the single-flight flag and `is_processing` for the duration of a scan.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    state: &'a StateStore,
}

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool, state: &'a StateStore) -> Result<Self, ProcessOutcome> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ProcessOutcome::Busy);
        }
        // The handle can be installed a moment before readiness is published
        if !state.begin_processing() {
            flag.store(false, Ordering::Release);
            return Err(ProcessOutcome::NotReady);
        }
        Ok(Self { flag, state })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.end_processing(self.flag);
    }
}
