use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::auth::Identity;
use crate::errors::AppError;
use crate::models::profile::StudentProfile;
use crate::placement::stats::{compute_stats, normalize, PlacementStats, StudentFilter, StudentQuery};
use crate::profile::ProfilePatch;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PlacementToggle {
    pub is_placed: bool,
}

/// GET /api/v1/placement/students
pub async fn handle_list_students(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<StudentQuery>,
) -> Result<Json<Vec<StudentProfile>>, AppError> {
    identity.require_tpo()?;
    let filter = StudentFilter::from_query(query).map_err(AppError::Validation)?;

    let students = state
        .profiles
        .list()
        .await?
        .into_iter()
        .map(normalize)
        .filter(|s| filter.matches(s))
        .collect();
    Ok(Json(students))
}

/// GET /api/v1/placement/stats
pub async fn handle_placement_stats(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<PlacementStats>, AppError> {
    identity.require_tpo()?;
    let students = state.profiles.list().await?;
    Ok(Json(compute_stats(&students)))
}

/// PUT /api/v1/placement/students/:uid/placement
///
/// Touches only `is_placed`; the student's own fields are left as stored.
pub async fn handle_set_placement(
    State(state): State<AppState>,
    identity: Identity,
    Path(uid): Path<String>,
    Json(req): Json<PlacementToggle>,
) -> Result<Json<StudentProfile>, AppError> {
    identity.require_tpo()?;
    if state.profiles.get(&uid).await?.is_none() {
        return Err(AppError::NotFound(format!("Student {uid} not found")));
    }

    let profile = state
        .profiles
        .merge(
            &uid,
            ProfilePatch {
                is_placed: Some(req.is_placed),
                updated_at: Some(Utc::now()),
                ..ProfilePatch::default()
            },
        )
        .await?;

    info!(uid = %uid, is_placed = req.is_placed, by = %identity.uid, "Placement status updated");
    Ok(Json(profile))
}
