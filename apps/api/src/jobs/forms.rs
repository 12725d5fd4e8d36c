//! Job postings and applications: form parsing and the rules for applying.

use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::errors::AppError;
use crate::models::job::JobRow;
use crate::models::profile::StudentProfile;
use crate::profile::split_skills;

pub const DEFAULT_JOB_TYPE: &str = "Full-time";
pub const PROFILE_REQUIRED_MESSAGE: &str =
    "Student profile not found. Please complete your profile first.";
pub const RESUME_REQUIRED_MESSAGE: &str = "Please upload your resume before applying.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Closed,
    Filled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Closed => "closed",
            JobStatus::Filled => "filled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Reviewing,
    Rejected,
    Accepted,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Accepted => "accepted",
        }
    }
}

/// Job posting form as submitted. Numeric fields arrive as text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobForm {
    pub role: String,
    pub company: String,
    pub location: String,
    pub job_type: Option<String>,
    pub salary: String,
    pub experience: String,
    pub description: String,
    /// One requirement per line.
    pub requirements: String,
    /// Comma-separated.
    pub skills: String,
    pub company_description: String,
}

/// A parsed job form, ready to insert or update.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFields {
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
}

impl JobForm {
    pub fn parse(self) -> Result<JobFields, AppError> {
        let role = self.role.trim().to_string();
        let company = self.company.trim().to_string();
        if role.is_empty() || company.is_empty() {
            return Err(AppError::Validation(
                "Role and company are required.".to_string(),
            ));
        }

        Ok(JobFields {
            role,
            company,
            location: self.location.trim().to_string(),
            job_type: self
                .job_type
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_JOB_TYPE.to_string()),
            salary: parse_number(&self.salary),
            experience: parse_number(&self.experience),
            description: self.description,
            requirements: split_lines(&self.requirements),
            skills: split_skills(&self.skills),
            company_description: self.company_description,
        })
    }
}

/// Unparseable or non-finite input becomes `None`.
fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(String::from)
        .collect()
}

/// Everything an application row snapshots at apply time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub job_title: String,
    pub company: String,
    pub student_id: String,
    pub student_name: String,
    pub student_email: String,
    pub resume_url: String,
    pub cover_letter: String,
    pub cgpa: String,
    pub skills: Vec<String>,
    pub branch: String,
}

/// Only the TPO who posted a job may change it or see who applied.
pub fn ensure_owner(job: &JobRow, identity: &Identity) -> Result<(), AppError> {
    identity.require_tpo()?;
    if job.posted_by != identity.uid {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// A student may apply only with a stored profile that has a resume.
pub fn build_application(
    job: &JobRow,
    student: Option<StudentProfile>,
    cover_letter: String,
) -> Result<NewApplication, AppError> {
    let student =
        student.ok_or_else(|| AppError::NotFound(PROFILE_REQUIRED_MESSAGE.to_string()))?;
    let resume_url = student
        .resume_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::Validation(RESUME_REQUIRED_MESSAGE.to_string()))?;

    Ok(NewApplication {
        job_title: job.role.clone(),
        company: job.company.clone(),
        student_id: student.uid,
        student_name: student.name,
        student_email: student.email,
        resume_url,
        cover_letter,
        cgpa: student.cgpa,
        skills: student.skills,
        branch: student.branch,
    })
}
