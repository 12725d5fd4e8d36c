use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use crate::auth::Identity;
use crate::errors::AppError;
use crate::models::profile::StudentProfile;
use crate::profile::ProfileFields;
use crate::resume::file::ResumeFile;
use crate::resume::orchestrator::{UploadOutcome, UploadRequest};
use crate::resume::progress::ProgressSnapshot;
use crate::state::AppState;

const FILE_PART: &str = "file";

#[derive(Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub fields: ProfileFields,
    pub resume_url: Option<String>,
    pub is_placed: bool,
}

#[derive(Serialize)]
pub struct CapabilitiesResponse {
    pub ocr_ready: bool,
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ProfileView>, AppError> {
    identity.require_student()?;
    let stored = state.profiles.get(&identity.uid).await?;
    Ok(Json(ProfileView {
        fields: ProfileFields::from_profile(stored.as_ref(), identity.email.as_deref()),
        resume_url: stored.as_ref().and_then(|p| p.resume_url.clone()),
        is_placed: stored.as_ref().is_some_and(|p| p.is_placed),
    }))
}

/// PUT /api/v1/profile
pub async fn handle_save_profile(
    State(state): State<AppState>,
    identity: Identity,
    Json(fields): Json<ProfileFields>,
) -> Result<Json<StudentProfile>, AppError> {
    identity.require_student()?;
    let profile = state.pipeline.save_profile(&identity, fields).await?;
    Ok(Json(profile))
}

/// POST /api/v1/profile/resume
///
/// Multipart body: a `file` part plus optional text parts named after the
/// profile fields, which replace the stored values as extraction defaults.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<Json<UploadOutcome>, AppError> {
    identity.require_student()?;
    let request = read_upload(multipart).await?;

    let observer = state.progress.observer(&identity.uid);
    let outcome = state
        .pipeline
        .upload_resume(&identity, request, state.ocr_capability, &observer)
        .await?;
    Ok(Json(outcome))
}

/// GET /api/v1/profile/resume/progress
pub async fn handle_upload_progress(
    State(state): State<AppState>,
    identity: Identity,
) -> Json<ProgressSnapshot> {
    Json(state.progress.snapshot(&identity.uid))
}

/// GET /api/v1/capabilities
pub async fn handle_capabilities(State(state): State<AppState>) -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse {
        ocr_ready: state.ocr_capability.is_ready(),
    })
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadRequest, AppError> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_PART {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(String::from);
            let data: Bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            request.file = Some(ResumeFile {
                filename,
                content_type,
                data,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            if !request.overrides.set(&name, value) {
                debug!("Ignoring unknown multipart part '{name}'");
            }
        }
    }

    Ok(request)
}
