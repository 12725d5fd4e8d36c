use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Identity;
use crate::errors::AppError;
use crate::jobs::forms::{
    build_application, ensure_owner, ApplicationStatus, JobForm, JobStatus,
};
use crate::models::job::{ApplicationRow, JobRow};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    /// Only jobs posted by the caller.
    #[serde(default)]
    pub mine: bool,
}

#[derive(Deserialize)]
pub struct ApplicationStatusQuery {
    pub status: Option<ApplicationStatus>,
}

#[derive(Deserialize)]
pub struct JobStatusUpdate {
    pub status: JobStatus,
}

#[derive(Deserialize)]
pub struct ApplicationStatusUpdate {
    pub status: ApplicationStatus,
}

#[derive(Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub cover_letter: String,
}

async fn fetch_job(state: &AppState, id: Uuid) -> Result<JobRow, AppError> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    identity: Identity,
    Json(form): Json<JobForm>,
) -> Result<(StatusCode, Json<JobRow>), AppError> {
    identity.require_tpo()?;
    let fields = form.parse()?;

    let job = sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs
            (id, role, company, location, job_type, salary, experience, description,
             requirements, skills, company_description, posted_by, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&fields.role)
    .bind(&fields.company)
    .bind(&fields.location)
    .bind(&fields.job_type)
    .bind(fields.salary)
    .bind(fields.experience)
    .bind(&fields.description)
    .bind(&fields.requirements)
    .bind(&fields.skills)
    .bind(&fields.company_description)
    .bind(&identity.uid)
    .bind(JobStatus::Active.as_str())
    .fetch_one(&state.db)
    .await?;

    info!(job_id = %job.id, by = %identity.uid, "Job posted");
    Ok((StatusCode::CREATED, Json(job)))
}

async fn fetch_owned_job(
    state: &AppState,
    id: Uuid,
    identity: &Identity,
) -> Result<JobRow, AppError> {
    let job = fetch_job(state, id).await?;
    ensure_owner(&job, identity)?;
    Ok(job)
}

/// GET /api/v1/jobs?status=&mine=
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let posted_by = query.mine.then_some(identity.uid.as_str());
    let jobs = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT * FROM jobs
        WHERE ($1::TEXT IS NULL OR status = $1) AND ($2::TEXT IS NULL OR posted_by = $2)
        ORDER BY posted_at DESC
        "#,
    )
    .bind(query.status.map(JobStatus::as_str))
    .bind(posted_by)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(jobs))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    Ok(Json(fetch_job(&state, id).await?))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(form): Json<JobForm>,
) -> Result<Json<JobRow>, AppError> {
    identity.require_tpo()?;
    let fields = form.parse()?;
    fetch_owned_job(&state, id, &identity).await?;

    let job = sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            role = $2, company = $3, location = $4, job_type = $5, salary = $6,
            experience = $7, description = $8, requirements = $9, skills = $10,
            company_description = $11, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&fields.role)
    .bind(&fields.company)
    .bind(&fields.location)
    .bind(&fields.job_type)
    .bind(fields.salary)
    .bind(fields.experience)
    .bind(&fields.description)
    .bind(&fields.requirements)
    .bind(&fields.skills)
    .bind(&fields.company_description)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))?;

    Ok(Json(job))
}

/// PATCH /api/v1/jobs/:id/status
pub async fn handle_set_job_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(req): Json<JobStatusUpdate>,
) -> Result<Json<JobRow>, AppError> {
    identity.require_tpo()?;
    fetch_owned_job(&state, id, &identity).await?;
    let job = sqlx::query_as::<_, JobRow>(
        "UPDATE jobs SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.status.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))?;

    info!(job_id = %id, status = req.status.as_str(), "Job status updated");
    Ok(Json(job))
}

/// DELETE /api/v1/jobs/:id
///
/// Applications to the job are removed with it.
pub async fn handle_delete_job(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    identity.require_tpo()?;
    fetch_owned_job(&state, id, &identity).await?;
    let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Job {id} not found")));
    }

    info!(job_id = %id, by = %identity.uid, "Job deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/jobs/:id/applications
pub async fn handle_apply(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<ApplicationRow>), AppError> {
    identity.require_student()?;
    let job = fetch_job(&state, id).await?;
    let student = state.profiles.get(&identity.uid).await?;
    let app = build_application(&job, student, req.cover_letter)?;

    let row = sqlx::query_as::<_, ApplicationRow>(
        r#"
        INSERT INTO applications
            (id, job_id, job_title, company, student_id, student_name, student_email,
             resume_url, cover_letter, status, cgpa, skills, branch)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(job.id)
    .bind(&app.job_title)
    .bind(&app.company)
    .bind(&app.student_id)
    .bind(&app.student_name)
    .bind(&app.student_email)
    .bind(&app.resume_url)
    .bind(&app.cover_letter)
    .bind(ApplicationStatus::Applied.as_str())
    .bind(&app.cgpa)
    .bind(&app.skills)
    .bind(&app.branch)
    .fetch_one(&state.db)
    .await?;

    info!(job_id = %id, uid = %identity.uid, "Application submitted");
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/jobs/:id/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Query(query): Query<ApplicationStatusQuery>,
) -> Result<Json<Vec<ApplicationRow>>, AppError> {
    identity.require_tpo()?;
    fetch_owned_job(&state, id, &identity).await?;

    let rows = sqlx::query_as::<_, ApplicationRow>(
        r#"
        SELECT * FROM applications
        WHERE job_id = $1 AND ($2::TEXT IS NULL OR status = $2)
        ORDER BY applied_at DESC
        "#,
    )
    .bind(id)
    .bind(query.status.map(ApplicationStatus::as_str))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// PATCH /api/v1/applications/:id/status
pub async fn handle_set_application_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplicationStatusUpdate>,
) -> Result<Json<ApplicationRow>, AppError> {
    identity.require_tpo()?;
    let job = sqlx::query_as::<_, JobRow>(
        "SELECT j.* FROM jobs j JOIN applications a ON a.job_id = j.id WHERE a.id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;
    ensure_owner(&job, &identity)?;

    let row = sqlx::query_as::<_, ApplicationRow>(
        "UPDATE applications SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.status.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;

    Ok(Json(row))
}
