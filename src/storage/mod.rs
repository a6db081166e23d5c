//! Persistent storage
//!
//! Data directory resolution, persisted settings and model weight downloads.

pub mod huggingface;
pub mod settings;

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Could not determine the application data directory")]
    NoDataDir,
    #[error("Invalid model reference: {0}")]
    InvalidReference(String),
    #[error("Download failed with status {status}: {url}")]
    BadStatus { status: u16, url: String },
    #[error("Download incomplete for {file}: got {actual} bytes, expected {expected}")]
    Incomplete {
        file: String,
        expected: u64,
        actual: u64,
    },
}

/// Application data directory (settings file and downloaded models live here)
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    ProjectDirs::from("com", "Recibos", "recibos")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StorageError::NoDataDir)
}
