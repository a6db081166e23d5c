//! Settings storage
//!
//! Manages persistence of the scanner's settings.

use crate::imaging::DEFAULT_MAX_DIMENSION;
use crate::storage::{get_data_dir, StorageError};
use crate::types::config::{ScanConfig, DEFAULT_MODEL_ID};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// HuggingFace repo id (or URL) of the vision-language model
    pub model_id: String,
    /// Repo revision to download
    #[serde(default = "default_revision")]
    pub revision: String,
    /// Longest image side sent to the model
    pub max_dimension: u32,
    /// Base URL of the local OpenAI-compatible vision runtime
    pub runtime_endpoint: String,
    /// Seconds to wait for one generation before giving up
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Directory where model weights are stored
    pub models_directory: PathBuf,
    /// Start loading the model as soon as the app starts
    #[serde(default = "default_auto_load")]
    pub auto_load_model: bool,
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_request_timeout() -> u64 {
    600
}

fn default_auto_load() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            revision: default_revision(),
            max_dimension: DEFAULT_MAX_DIMENSION,
            runtime_endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: default_request_timeout(),
            models_directory: get_data_dir()
                .ok()
                .map(|d| d.join("models"))
                .unwrap_or_else(|| PathBuf::from("./models")),
            auto_load_model: default_auto_load(),
        }
    }
}

impl AppSettings {
    /// Validate settings values
    ///
    /// Replaces empty or out-of-range values with their defaults.
    pub fn validate(&mut self) {
        if self.model_id.trim().is_empty() {
            self.model_id = DEFAULT_MODEL_ID.to_string();
        }

        if self.revision.trim().is_empty() {
            self.revision = default_revision();
        }

        // Below 256px receipts are unreadable; above 8192 the bound is pointless
        self.max_dimension = self.max_dimension.clamp(256, 8192);

        let endpoint = self.runtime_endpoint.trim().trim_end_matches('/');
        self.runtime_endpoint = if endpoint.is_empty() {
            DEFAULT_ENDPOINT.to_string()
        } else {
            endpoint.to_string()
        };

        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout();
        }
    }

    /// Core configuration derived from these settings
    pub fn scan_config(&self) -> ScanConfig {
        let mut config = ScanConfig {
            model_id: self.model_id.clone(),
            max_dimension: self.max_dimension,
        };
        config.validate();
        config
    }
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file doesn't exist or is corrupted
pub fn load_settings() -> AppSettings {
    match get_settings_path() {
        Ok(path) => load_settings_from(&path),
        Err(e) => {
            tracing::warn!("Failed to locate settings, using defaults: {}", e);
            AppSettings::default()
        }
    }
}

/// Load settings from a specific file, falling back to defaults
pub fn load_settings_from(path: &Path) -> AppSettings {
    match load_settings_internal(path) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            AppSettings::default()
        }
    }
}

/// Internal settings loading with error propagation
fn load_settings_internal(path: &Path) -> Result<AppSettings, StorageError> {
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Ok(AppSettings::default());
    }

    let json = fs::read_to_string(path)?;
    let mut settings: AppSettings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Save settings to disk
pub fn save_settings(settings: &AppSettings) -> Result<(), StorageError> {
    save_settings_to(settings, &get_settings_path()?)
}

/// Save settings to a specific file
pub fn save_settings_to(settings: &AppSettings, path: &Path) -> Result<(), StorageError> {
    // Ensure the parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to {:?}", path);
    Ok(())
}
