//! Profile store: one record per student, written with merge semantics.
//!
//! `merge` only touches the columns present in the patch, so the resume
//! pipeline and the TPO placement toggle can write the same row without
//! clobbering each other's fields. Same-field races are last-write-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use crate::models::profile::StudentProfile;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// A partial profile write. `None` leaves the stored column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub cgpa: Option<String>,
    pub branch: Option<String>,
    pub skills: Option<Vec<String>>,
    pub resume_url: Option<String>,
    pub is_placed: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfilePatch {
    /// Applies the patch to an existing record, or to a fresh one for `uid`.
    /// Used by stores that merge in memory; mirrors the SQL upsert below.
    pub fn apply(self, uid: &str, existing: Option<StudentProfile>, now: DateTime<Utc>) -> StudentProfile {
        let mut profile = existing.unwrap_or_else(|| StudentProfile {
            uid: uid.to_string(),
            name: String::new(),
            email: String::new(),
            cgpa: String::new(),
            branch: String::new(),
            skills: Vec::new(),
            resume_url: None,
            is_placed: false,
            created_at: now,
            updated_at: now,
        });
        if let Some(v) = self.name {
            profile.name = v;
        }
        if let Some(v) = self.email {
            profile.email = v;
        }
        if let Some(v) = self.cgpa {
            profile.cgpa = v;
        }
        if let Some(v) = self.branch {
            profile.branch = v;
        }
        if let Some(v) = self.skills {
            profile.skills = v;
        }
        if let Some(v) = self.resume_url {
            profile.resume_url = Some(v);
        }
        if let Some(v) = self.is_placed {
            profile.is_placed = v;
        }
        if let Some(v) = self.updated_at {
            profile.updated_at = v;
        }
        profile
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, uid: &str) -> Result<Option<StudentProfile>, StoreError>;

    /// Upsert: creates the record when absent, otherwise overwrites only the
    /// fields present in `patch`. Returns the record as stored.
    async fn merge(&self, uid: &str, patch: ProfilePatch) -> Result<StudentProfile, StoreError>;

    async fn list(&self) -> Result<Vec<StudentProfile>, StoreError>;
}

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get(&self, uid: &str) -> Result<Option<StudentProfile>, StoreError> {
        Ok(
            sqlx::query_as::<_, StudentProfile>("SELECT * FROM students WHERE uid = $1")
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn merge(&self, uid: &str, patch: ProfilePatch) -> Result<StudentProfile, StoreError> {
        let ProfilePatch {
            name,
            email,
            cgpa,
            branch,
            skills,
            resume_url,
            is_placed,
            updated_at,
        } = patch;

        // Parameters left NULL keep the stored value on conflict and fall back
        // to the column default on insert.
        let row = sqlx::query_as::<_, StudentProfile>(
            r#"
            INSERT INTO students
                (uid, name, email, cgpa, branch, skills, resume_url, is_placed, updated_at)
            VALUES
                ($1,
                 COALESCE($2, ''),
                 COALESCE($3, ''),
                 COALESCE($4, ''),
                 COALESCE($5, ''),
                 COALESCE($6, ARRAY[]::TEXT[]),
                 $7,
                 COALESCE($8, FALSE),
                 COALESCE($9, NOW()))
            ON CONFLICT (uid) DO UPDATE SET
                name       = COALESCE($2, students.name),
                email      = COALESCE($3, students.email),
                cgpa       = COALESCE($4, students.cgpa),
                branch     = COALESCE($5, students.branch),
                skills     = COALESCE($6, students.skills),
                resume_url = COALESCE($7, students.resume_url),
                is_placed  = COALESCE($8, students.is_placed),
                updated_at = COALESCE($9, students.updated_at)
            RETURNING *
            "#,
        )
        .bind(uid)
        .bind(name)
        .bind(email)
        .bind(cgpa)
        .bind(branch)
        .bind(skills)
        .bind(resume_url)
        .bind(is_placed)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list(&self) -> Result<Vec<StudentProfile>, StoreError> {
        Ok(
            sqlx::query_as::<_, StudentProfile>("SELECT * FROM students ORDER BY name, uid")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_creates_record_with_defaults() {
        let now = Utc::now();
        let patch = ProfilePatch {
            resume_url: Some("https://cdn/r.pdf".to_string()),
            updated_at: Some(now),
            ..ProfilePatch::default()
        };
        let p = patch.apply("u1", None, now);
        assert_eq!(p.uid, "u1");
        assert_eq!(p.resume_url.as_deref(), Some("https://cdn/r.pdf"));
        assert!(!p.is_placed);
        assert!(p.skills.is_empty());
    }

    #[test]
    fn test_apply_leaves_absent_fields_untouched() {
        let now = Utc::now();
        let existing = ProfilePatch {
            name: Some("Asha".to_string()),
            resume_url: Some("https://cdn/old.pdf".to_string()),
            is_placed: Some(true),
            ..ProfilePatch::default()
        }
        .apply("u1", None, now);

        let updated = ProfilePatch {
            cgpa: Some("8.2".to_string()),
            ..ProfilePatch::default()
        }
        .apply("u1", Some(existing), now);

        assert_eq!(updated.name, "Asha");
        assert_eq!(updated.cgpa, "8.2");
        assert_eq!(updated.resume_url.as_deref(), Some("https://cdn/old.pdf"));
        assert!(updated.is_placed);
    }
}
