// Resume pipeline: validate → upload → extract → merge → persist.
// External systems (object storage, OCR, profile store, lock) sit behind
// traits so the orchestrator runs headless in tests.

pub mod extraction;
pub mod file;
pub mod handlers;
pub mod lock;
pub mod ocr;
pub mod orchestrator;
pub mod progress;
pub mod storage;

use thiserror::Error;

use crate::profile::StoreError;
use lock::LockError;
use ocr::RecognitionError;
use storage::UploadError;

pub const CAPABILITY_UNAVAILABLE_MESSAGE: &str = "Text extraction not ready. Try PDF or later.";
pub const BUSY_MESSAGE: &str = "Another resume operation is already in progress. Please wait for it to finish.";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or missing file. Raised before any network call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An image was submitted while OCR failed its readiness check.
    #[error("OCR capability unavailable")]
    CapabilityUnavailable,

    #[error("operation already in progress")]
    Busy,

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("recognition failed: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("profile store failed: {0}")]
    Store(#[from] StoreError),

    #[error("lock failed: {0}")]
    Lock(#[from] LockError),
}

impl PipelineError {
    /// Message suitable for showing to the student.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(msg) => msg.clone(),
            PipelineError::CapabilityUnavailable => CAPABILITY_UNAVAILABLE_MESSAGE.to_string(),
            PipelineError::Busy => BUSY_MESSAGE.to_string(),
            PipelineError::Upload(_) => "Upload failed. Please try again.".to_string(),
            PipelineError::Recognition(e) => format!("Text extraction failed: {e}"),
            PipelineError::Store(_) => "Save failed. Try again.".to_string(),
            PipelineError::Lock(_) => "Could not start the operation. Please try again.".to_string(),
        }
    }
}
