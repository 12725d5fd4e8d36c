//! Caller identity, as asserted by the upstream identity gateway.
//!
//! The gateway authenticates the user and forwards `x-user-id`,
//! `x-user-email` and `x-user-role`. A request without a usable uid is
//! rejected before any handler runs.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";

const MAX_UID_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Tpo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub role: Role,
}

impl Identity {
    #[cfg(test)]
    pub fn student(uid: &str, email: Option<&str>) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.map(String::from),
            role: Role::Student,
        }
    }

    pub fn require_tpo(&self) -> Result<(), AppError> {
        match self.role {
            Role::Tpo => Ok(()),
            Role::Student => Err(AppError::Forbidden),
        }
    }

    pub fn require_student(&self) -> Result<(), AppError> {
        match self.role {
            Role::Student => Ok(()),
            Role::Tpo => Err(AppError::Forbidden),
        }
    }
}

/// Uids end up in storage paths and lock keys, so only a conservative
/// character set is accepted.
fn valid_uid(uid: &str) -> bool {
    !uid.is_empty()
        && uid.len() <= MAX_UID_LEN
        && uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uid = header(parts, USER_ID_HEADER)
            .filter(|uid| valid_uid(uid))
            .ok_or(AppError::Unauthorized)?;

        let role = match header(parts, USER_ROLE_HEADER) {
            None => Role::Student,
            Some(r) if r.eq_ignore_ascii_case("student") => Role::Student,
            Some(r) if r.eq_ignore_ascii_case("tpo") => Role::Tpo,
            Some(_) => return Err(AppError::Unauthorized),
        };

        Ok(Identity {
            uid: uid.to_string(),
            email: header(parts, USER_EMAIL_HEADER).map(String::from),
            role,
        })
    }
}
