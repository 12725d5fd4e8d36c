use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row per student, keyed by the identity provider's uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StudentProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    /// Decimal string as typed or extracted, e.g. "8.75".
    pub cgpa: String,
    pub branch: String,
    pub skills: Vec<String>,
    pub resume_url: Option<String>,
    pub is_placed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
