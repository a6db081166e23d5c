//! Model acquisition
//!
//! Drives the provider's load exactly once per successful run and publishes
//! its progress into the state store.
//!
//! The provider may report progress from any thread. Its callback only posts
//! the fraction onto a channel; the task awaiting [`ModelAcquisition::load`]
//! drains that channel and is the only writer of loading state.

use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::OnceCell;
use tokio::sync::mpsc;

use crate::inference::provider::{ModelProvider, ProgressCallback};
use crate::state::StateStore;

/// Where the loaded handle lives. Written once by acquisition, read by inference.
pub type ModelSlot<H> = Arc<OnceCell<H>>;

/// Lifecycle of the model load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionPhase {
    NotStarted,
    Loading,
    Ready,
    Failed(String),
}

/// What a call to [`ModelAcquisition::load`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// This call loaded the model
    Loaded,
    /// An earlier call already loaded it; nothing happened
    AlreadyReady,
    /// Another call is loading right now; nothing happened
    AlreadyLoading,
    /// The provider failed; the message is also in `loading_progress`
    Failed(String),
}

/// Format a load fraction as a whole percentage, e.g. `0.5 -> "50%"`.
pub fn format_progress(fraction: f64) -> String {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    // Epsilon keeps 0.29 from printing as 28%
    format!("{}%", (fraction * 100.0 + 1e-6) as u32)
}

pub struct ModelAcquisition<P: ModelProvider> {
    provider: Arc<P>,
    model_id: String,
    state: Arc<StateStore>,
    slot: ModelSlot<P::Handle>,
    phase: Mutex<AcquisitionPhase>,
}

impl<P: ModelProvider> ModelAcquisition<P> {
    pub fn new(
        provider: Arc<P>,
        model_id: impl Into<String>,
        state: Arc<StateStore>,
        slot: ModelSlot<P::Handle>,
    ) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            state,
            slot,
            phase: Mutex::new(AcquisitionPhase::NotStarted),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn phase(&self) -> AcquisitionPhase {
        self.lock_phase().clone()
    }

    /// Load the model if nobody has yet.
    ///
    /// Safe to call repeatedly: a call during a load or after success is a
    /// no-op, a call after failure tries again. There is no automatic retry.
    pub async fn load(&self) -> LoadOutcome {
        {
            let mut phase = self.lock_phase();
            match *phase {
                AcquisitionPhase::Ready => return LoadOutcome::AlreadyReady,
                AcquisitionPhase::Loading => return LoadOutcome::AlreadyLoading,
                AcquisitionPhase::NotStarted | AcquisitionPhase::Failed(_) => {
                    *phase = AcquisitionPhase::Loading;
                }
            }
        }
        let mut guard = LoadingGuard {
            phase: &self.phase,
            state: &self.state,
            settled: false,
        };

        tracing::info!("Loading model {}", self.model_id);
        self.state.begin_loading();

        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let on_progress: ProgressCallback = Arc::new(move |fraction| {
            // Receiver gone means the load already finished
            let _ = tx.send(fraction);
        });

        let load = self.provider.load(&self.model_id, on_progress);
        tokio::pin!(load);

        let result = loop {
            tokio::select! {
                biased;
                Some(fraction) = rx.recv() => {
                    self.state.set_progress(format_progress(fraction));
                }
                result = &mut load => break result,
            }
        };
        // Progress posted just before completion still lands before readiness
        while let Ok(fraction) = rx.try_recv() {
            self.state.set_progress(format_progress(fraction));
        }

        match result {
            Ok(handle) => {
                if self.slot.set(handle).is_err() {
                    tracing::warn!("Model slot was already filled, keeping the first handle");
                }
                guard.settle(AcquisitionPhase::Ready);
                self.state.mark_ready();
                tracing::info!("Model {} ready", self.model_id);
                LoadOutcome::Loaded
            }
            Err(e) => {
                let message = format!("Error al cargar el modelo: {}", e);
                tracing::error!("{}", message);
                guard.settle(AcquisitionPhase::Failed(message.clone()));
                self.state.fail_loading(message.clone());
                LoadOutcome::Failed(message)
            }
        }
    }

    fn lock_phase(&self) -> MutexGuard<'_, AcquisitionPhase> {
        lock_phase(&self.phase)
    }
}

fn lock_phase(phase: &Mutex<AcquisitionPhase>) -> MutexGuard<'_, AcquisitionPhase> {
    phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Puts the phase back to `NotStarted` and clears published progress if a
/// load is dropped before it settles.
struct LoadingGuard<'a> {
    phase: &'a Mutex<AcquisitionPhase>,
    state: &'a StateStore,
    settled: bool,
}

impl LoadingGuard<'_> {
    fn settle(&mut self, next: AcquisitionPhase) {
        *lock_phase(self.phase) = next;
        self.settled = true;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Model load abandoned before completion");
            *lock_phase(self.phase) = AcquisitionPhase::NotStarted;
            self.state.abandon_loading();
        }
    }
}
