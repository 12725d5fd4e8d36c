use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub role: String,
    pub company: String,
    pub location: String,
    pub job_type: String,
    pub salary: Option<f64>,
    pub experience: Option<f64>,
    pub description: String,
    pub requirements: Vec<String>,
    pub skills: Vec<String>,
    pub company_description: String,
    pub posted_by: String,
    pub status: String,
    pub posted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub company: String,
    pub student_id: String,
    pub student_name: String,
    pub student_email: String,
    pub resume_url: String,
    pub cover_letter: String,
    pub status: String,
    pub cgpa: String,
    pub skills: Vec<String>,
    pub branch: String,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
