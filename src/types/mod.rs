//! Shared type definitions
//!
//! This module contains the data types shared between the scanner components.

pub mod config;
pub mod model;
pub mod receipt;
pub mod state;

pub use config::ScanConfig;
pub use model::ModelInfo;
pub use receipt::{InferenceRequest, InferenceResult};
pub use state::ManagerState;
