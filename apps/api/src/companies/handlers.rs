use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::auth::Identity;
use crate::companies::forms::CompanyForm;
use crate::errors::AppError;
use crate::models::company::CompanyRow;
use crate::state::AppState;

/// POST /api/v1/companies
pub async fn handle_create_company(
    State(state): State<AppState>,
    identity: Identity,
    Json(form): Json<CompanyForm>,
) -> Result<(StatusCode, Json<CompanyRow>), AppError> {
    identity.require_tpo()?;
    let fields = form.parse()?;

    let company = sqlx::query_as::<_, CompanyRow>(
        r#"
        INSERT INTO companies
            (id, name, industry, location, website, description, logo, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&fields.name)
    .bind(&fields.industry)
    .bind(&fields.location)
    .bind(&fields.website)
    .bind(&fields.description)
    .bind(&fields.logo)
    .bind(&identity.uid)
    .fetch_one(&state.db)
    .await?;

    info!(company_id = %company.id, by = %identity.uid, "Company added");
    Ok((StatusCode::CREATED, Json(company)))
}

/// GET /api/v1/companies
pub async fn handle_list_companies(
    State(state): State<AppState>,
    _identity: Identity,
) -> Result<Json<Vec<CompanyRow>>, AppError> {
    let companies = sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(companies))
}

/// GET /api/v1/companies/:id
pub async fn handle_get_company(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<CompanyRow>, AppError> {
    let company = sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {id} not found")))?;
    Ok(Json(company))
}

/// PUT /api/v1/companies/:id
pub async fn handle_update_company(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(form): Json<CompanyForm>,
) -> Result<Json<CompanyRow>, AppError> {
    identity.require_tpo()?;
    let fields = form.parse()?;

    let company = sqlx::query_as::<_, CompanyRow>(
        r#"
        UPDATE companies SET
            name = $2, industry = $3, location = $4, website = $5,
            description = $6, logo = $7, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&fields.name)
    .bind(&fields.industry)
    .bind(&fields.location)
    .bind(&fields.website)
    .bind(&fields.description)
    .bind(&fields.logo)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Company {id} not found")))?;

    Ok(Json(company))
}

/// DELETE /api/v1/companies/:id
pub async fn handle_delete_company(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    identity.require_tpo()?;
    let result = sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Company {id} not found")));
    }

    info!(company_id = %id, by = %identity.uid, "Company deleted");
    Ok(StatusCode::NO_CONTENT)
}
