//! Local vision-language runtime provider
//!
//! Weights are fetched from HuggingFace into the models directory; generation
//! goes to a local OpenAI-compatible server (llama.cpp `llama-server`,
//! `mlx_vlm.server`) that serves those weights.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

use crate::imaging::to_data_url;
use crate::inference::provider::{GenerationError, LoadError, ModelProvider, ProgressCallback};
use crate::storage::huggingface::{download_repo, repo_dir_name, RepoRef};
use crate::storage::settings::AppSettings;
use crate::types::{InferenceRequest, ModelInfo};

/// Loaded model: where its weights are and which name the runtime knows it by.
#[derive(Debug, Clone)]
pub struct LocalVlmHandle {
    pub info: ModelInfo,
}

pub struct LocalVlmProvider {
    client: reqwest::Client,
    endpoint: String,
    models_dir: PathBuf,
    revision: String,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LocalVlmProvider {
    pub fn new(settings: &AppSettings) -> Result<Self, reqwest::Error> {
        // Downloads can take a very long time; generation gets its own per-request timeout
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.runtime_endpoint.trim_end_matches('/').to_string(),
            models_dir: settings.models_directory.clone(),
            revision: settings.revision.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint)
    }
}

/// OpenAI-style chat body: one user turn holding the prompt and the image.
fn chat_body(model_id: &str, request: &InferenceRequest, image_url: &str) -> serde_json::Value {
    json!({
        "model": model_id,
        "temperature": request.temperature,
        "stream": false,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": request.prompt },
                { "type": "image_url", "image_url": { "url": image_url } }
            ]
        }]
    })
}

fn completion_text(completion: ChatCompletion) -> Result<String, GenerationError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GenerationError::Provider("runtime returned no choices".to_string()))
}

fn request_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Provider(e.to_string())
    }
}

#[async_trait]
impl ModelProvider for LocalVlmProvider {
    type Handle = LocalVlmHandle;

    async fn load(
        &self,
        model_id: &str,
        on_progress: ProgressCallback,
    ) -> Result<LocalVlmHandle, LoadError> {
        let repo = RepoRef::parse(model_id, &self.revision)?;
        let target_dir = self.models_dir.join(repo_dir_name(&repo.repo_id));

        let info = download_repo(&self.client, &repo, &target_dir, move |done, total| {
            let fraction = if total == 0 {
                1.0
            } else {
                done as f64 / total as f64
            };
            on_progress(fraction);
        })
        .await?;

        if info.files.is_empty() {
            return Err(LoadError::Corrupted(format!(
                "no weight files for {}",
                info.model_id
            )));
        }

        tracing::info!(
            "Weights for {} available in {:?}",
            info.model_id,
            info.directory
        );
        Ok(LocalVlmHandle { info })
    }

    async fn generate(
        &self,
        handle: &LocalVlmHandle,
        request: &InferenceRequest,
    ) -> Result<String, GenerationError> {
        let image_url =
            to_data_url(&request.image).map_err(|e| GenerationError::InvalidInput(e.to_string()))?;
        let body = chat_body(&handle.info.model_id, request, &image_url);

        tracing::debug!(id = %request.id, "Posting to {}", self.completions_url());
        let response = self
            .client
            .post(self.completions_url())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider(format!(
                "runtime returned {}: {}",
                status,
                detail.trim()
            )));
        }

        let completion: ChatCompletion = response.json().await.map_err(request_error)?;
        completion_text(completion)
    }
}
