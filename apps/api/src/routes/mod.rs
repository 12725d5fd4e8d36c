pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};

use crate::companies::handlers as companies;
use crate::jobs::handlers as jobs;
use crate::placement::handlers as placement;
use crate::resume::handlers as resume;
use crate::state::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/capabilities", get(resume::handle_capabilities))
        // Student profile and resume pipeline
        .route(
            "/api/v1/profile",
            get(resume::handle_get_profile).put(resume::handle_save_profile),
        )
        .route(
            "/api/v1/profile/resume",
            post(resume::handle_upload_resume).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/profile/resume/progress",
            get(resume::handle_upload_progress),
        )
        // Placement overview (TPO)
        .route(
            "/api/v1/placement/students",
            get(placement::handle_list_students),
        )
        .route("/api/v1/placement/stats", get(placement::handle_placement_stats))
        .route(
            "/api/v1/placement/students/:uid/placement",
            put(placement::handle_set_placement),
        )
        // Company directory
        .route(
            "/api/v1/companies",
            post(companies::handle_create_company).get(companies::handle_list_companies),
        )
        .route(
            "/api/v1/companies/:id",
            get(companies::handle_get_company)
                .put(companies::handle_update_company)
                .delete(companies::handle_delete_company),
        )
        // Jobs and applications
        .route(
            "/api/v1/jobs",
            post(jobs::handle_create_job).get(jobs::handle_list_jobs),
        )
        .route(
            "/api/v1/jobs/:id",
            get(jobs::handle_get_job)
                .put(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        .route("/api/v1/jobs/:id/status", patch(jobs::handle_set_job_status))
        .route(
            "/api/v1/jobs/:id/applications",
            post(jobs::handle_apply).get(jobs::handle_list_applications),
        )
        .route(
            "/api/v1/applications/:id/status",
            patch(jobs::handle_set_application_status),
        )
        .with_state(state)
}
