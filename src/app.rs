//! Receipt scanner façade
//!
//! This is what a UI binds to: four observable fields through [`ReceiptScanner::subscribe`]
//! and two commands, `load_model` and `process_receipt`.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::broadcast;

use crate::inference::{
    AcquisitionPhase, InferenceSession, LoadOutcome, ModelAcquisition, ModelProvider,
    ProcessOutcome, ReceiptImage,
};
use crate::state::StateStore;
use crate::types::{ManagerState, ScanConfig};

pub struct ReceiptScanner<P: ModelProvider> {
    state: Arc<StateStore>,
    acquisition: ModelAcquisition<P>,
    session: InferenceSession<P>,
}

impl<P: ModelProvider> ReceiptScanner<P> {
    pub fn new(provider: P, mut config: ScanConfig) -> Self {
        config.validate();
        tracing::info!(
            "Receipt scanner using {} (max {}px)",
            config.model_id,
            config.max_dimension
        );

        let provider = Arc::new(provider);
        let state = Arc::new(StateStore::new());
        let slot = Arc::new(OnceCell::new());

        Self {
            acquisition: ModelAcquisition::new(
                provider.clone(),
                config.model_id,
                state.clone(),
                slot.clone(),
            ),
            session: InferenceSession::new(provider, slot, state.clone(), config.max_dimension),
            state,
        }
    }

    /// Fetch and load the model. Call once at startup; repeat only after a failure.
    pub async fn load_model(&self) -> LoadOutcome {
        self.acquisition.load().await
    }

    /// Scan a decoded image or encoded capture bytes.
    pub async fn process_receipt(&self, image: impl Into<ReceiptImage>) -> ProcessOutcome {
        self.session.process_receipt(image).await
    }

    /// Drop the previous answer, e.g. when the user picks a new photo.
    pub fn clear_result(&self) -> bool {
        self.state.clear_result()
    }

    pub fn state(&self) -> ManagerState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerState> {
        self.state.subscribe()
    }

    pub fn phase(&self) -> AcquisitionPhase {
        self.acquisition.phase()
    }

    pub fn model_id(&self) -> &str {
        self.acquisition.model_id()
    }
}
