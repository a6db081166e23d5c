//! Model lifecycle and inference
//!
//! Acquisition obtains the model handle once; the session runs guarded scans
//! against it. Both talk to the runtime only through [`ModelProvider`].

pub mod acquisition;
pub mod local_vlm;
pub mod prompt;
pub mod provider;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use acquisition::{AcquisitionPhase, LoadOutcome, ModelAcquisition, ModelSlot};
pub use local_vlm::{LocalVlmHandle, LocalVlmProvider};
pub use provider::{GenerationError, LoadError, ModelProvider, ProgressCallback};
pub use session::{InferenceSession, ProcessOutcome, ReceiptImage};
