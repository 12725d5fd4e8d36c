use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::profile::ProfileStore;
use crate::resume::ocr::OcrCapability;
use crate::resume::orchestrator::ResumePipeline;
use crate::resume::progress::ProgressBoard;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Jobs and applications are queried directly; student records go through `profiles`.
    pub db: PgPool,
    pub profiles: Arc<dyn ProfileStore>,
    pub pipeline: Arc<ResumePipeline>,
    pub progress: ProgressBoard,
    /// Probed once at startup and passed to every upload.
    pub ocr_capability: OcrCapability,
    pub config: Config,
}
