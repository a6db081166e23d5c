//! Scripted provider for tests
//!
//! Replays canned progress, load failures and generation outputs without a model.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::inference::provider::{GenerationError, LoadError, ModelProvider, ProgressCallback};
use crate::types::InferenceRequest;

/// What the provider was asked to generate from
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub dimensions: (u32, u32),
    pub temperature: f32,
    pub prompt: String,
}

#[derive(Default)]
pub struct ScriptedProvider {
    progress: Vec<f64>,
    progress_from_thread: bool,
    load_failures: AtomicUsize,
    load_error: String,
    load_calls: Arc<AtomicUsize>,
    load_gate: Option<Arc<Notify>>,
    outputs: Mutex<VecDeque<Result<String, String>>>,
    generate_calls: Arc<AtomicUsize>,
    generate_gate: Option<Arc<Notify>>,
    generate_panics: bool,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, fractions: Vec<f64>) -> Self {
        self.progress = fractions;
        self
    }

    /// Report progress from a blocking thread instead of the calling task.
    pub fn with_progress_from_thread(mut self) -> Self {
        self.progress_from_thread = true;
        self
    }

    /// Fail the first `count` loads with `message`.
    pub fn with_load_failures(mut self, count: usize, message: &str) -> Self {
        self.load_failures = AtomicUsize::new(count);
        self.load_error = message.to_string();
        self
    }

    /// Block every load, after its progress, until the gate is notified.
    pub fn with_load_gate(mut self) -> Self {
        self.load_gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn with_output(self, output: &str) -> Self {
        self.push_outcome(Ok(output.to_string()))
    }

    pub fn with_generation_error(self, message: &str) -> Self {
        self.push_outcome(Err(message.to_string()))
    }

    /// Block every generation until the gate is notified.
    pub fn with_generate_gate(mut self) -> Self {
        self.generate_gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn with_generate_panic(mut self) -> Self {
        self.generate_panics = true;
        self
    }

    pub fn load_gate(&self) -> Arc<Notify> {
        self.load_gate.clone().expect("provider built without a load gate")
    }

    pub fn generate_gate(&self) -> Arc<Notify> {
        self.generate_gate
            .clone()
            .expect("provider built without a generate gate")
    }

    pub fn load_calls(&self) -> Arc<AtomicUsize> {
        self.load_calls.clone()
    }

    pub fn generate_calls(&self) -> Arc<AtomicUsize> {
        self.generate_calls.clone()
    }

    pub fn seen_requests(&self) -> Arc<Mutex<Vec<SeenRequest>>> {
        self.seen.clone()
    }

    fn push_outcome(self, outcome: Result<String, String>) -> Self {
        self.outputs.lock().unwrap().push_back(outcome);
        self
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    type Handle = ();

    async fn load(&self, _model_id: &str, on_progress: ProgressCallback) -> Result<(), LoadError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);

        if self.progress_from_thread {
            let fractions = self.progress.clone();
            tokio::task::spawn_blocking(move || {
                for fraction in fractions {
                    on_progress(fraction);
                }
            })
            .await
            .expect("progress thread panicked");
        } else {
            for &fraction in &self.progress {
                on_progress(fraction);
            }
        }

        if let Some(gate) = &self.load_gate {
            gate.notified().await;
        }

        let remaining = self.load_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.load_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(LoadError::Download(self.load_error.clone()));
        }
        Ok(())
    }

    async fn generate(
        &self,
        _handle: &(),
        request: &InferenceRequest,
    ) -> Result<String, GenerationError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(SeenRequest {
            dimensions: (request.image.width(), request.image.height()),
            temperature: request.temperature,
            prompt: request.prompt.clone(),
        });

        if let Some(gate) = &self.generate_gate {
            gate.notified().await;
        }

        if self.generate_panics {
            panic!("scripted provider panic");
        }

        let next = self.outputs.lock().unwrap().pop_front();
        match next {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(GenerationError::Provider(message)),
            None => Ok("{}".to_string()),
        }
    }
}
