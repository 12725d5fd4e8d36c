//! The editable profile form: five text fields that extraction fills in and
//! the student corrects before saving.

use serde::{Deserialize, Serialize};

use crate::models::profile::StudentProfile;

/// Edit buffer for the candidate profile. `skills` is comma-joined text here
/// and only becomes a sequence when persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub cgpa: String,
    #[serde(default)]
    pub skills: String,
    #[serde(default)]
    pub branch: String,
}

impl ProfileFields {
    /// Hydrates the buffer from a stored record. The identity email is used when
    /// the record has none (or there is no record yet).
    pub fn from_profile(profile: Option<&StudentProfile>, identity_email: Option<&str>) -> Self {
        let fallback_email = identity_email.unwrap_or_default().to_string();
        match profile {
            Some(p) => Self {
                name: p.name.clone(),
                email: if p.email.is_empty() {
                    fallback_email
                } else {
                    p.email.clone()
                },
                cgpa: p.cgpa.clone(),
                skills: join_skills(&p.skills),
                branch: p.branch.clone(),
            },
            None => Self {
                email: fallback_email,
                ..Self::default()
            },
        }
    }

    /// The skills text as the sequence that gets persisted.
    pub fn skill_list(&self) -> Vec<String> {
        split_skills(&self.skills)
    }
}

/// Partial edit buffer sent alongside an upload. Present values replace the
/// stored ones before extraction uses them as defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOverrides {
    pub name: Option<String>,
    pub email: Option<String>,
    pub cgpa: Option<String>,
    pub skills: Option<String>,
    pub branch: Option<String>,
}

impl FieldOverrides {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.cgpa.is_none()
            && self.skills.is_none()
            && self.branch.is_none()
    }

    /// Records a multipart text part by field name. Unknown names are ignored.
    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "cgpa" => &mut self.cgpa,
            "skills" => &mut self.skills,
            "branch" => &mut self.branch,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn apply_to(self, mut fields: ProfileFields) -> ProfileFields {
        if let Some(v) = self.name {
            fields.name = v;
        }
        if let Some(v) = self.email {
            fields.email = v;
        }
        if let Some(v) = self.cgpa {
            fields.cgpa = v;
        }
        if let Some(v) = self.skills {
            fields.skills = v;
        }
        if let Some(v) = self.branch {
            fields.branch = v;
        }
        fields
    }
}

/// Splits the comma-separated skills text, trimming each entry and dropping
/// empty ones.
pub fn split_skills(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn join_skills(skills: &[String]) -> String {
    skills.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(email: &str, skills: &[&str]) -> StudentProfile {
        StudentProfile {
            uid: "u1".to_string(),
            name: "Asha Rao".to_string(),
            email: email.to_string(),
            cgpa: "8.10".to_string(),
            branch: "Civil".to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            resume_url: None,
            is_placed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_split_trims_surrounding_whitespace() {
        assert_eq!(split_skills("Python, Go,  Rust"), vec!["Python", "Go", "Rust"]);
    }

    #[test]
    fn test_split_drops_empty_entries() {
        assert_eq!(split_skills("Java,, SQL, "), vec!["Java", "SQL"]);
        assert!(split_skills("").is_empty());
        assert!(split_skills(" , ").is_empty());
    }

    #[test]
    fn test_split_keeps_duplicates() {
        assert_eq!(split_skills("Go, Go"), vec!["Go", "Go"]);
    }

    #[test]
    fn test_from_profile_joins_skills() {
        let p = stored("asha@campus.edu", &["C", "Rust"]);
        let fields = ProfileFields::from_profile(Some(&p), Some("other@campus.edu"));
        assert_eq!(fields.skills, "C, Rust");
        assert_eq!(fields.email, "asha@campus.edu");
        assert_eq!(fields.branch, "Civil");
    }

    #[test]
    fn test_from_profile_falls_back_to_identity_email() {
        let p = stored("", &[]);
        let fields = ProfileFields::from_profile(Some(&p), Some("asha@campus.edu"));
        assert_eq!(fields.email, "asha@campus.edu");

        let fresh = ProfileFields::from_profile(None, Some("new@campus.edu"));
        assert_eq!(fresh.email, "new@campus.edu");
        assert!(fresh.name.is_empty());
    }

    #[test]
    fn test_overrides_replace_only_present_fields() {
        let mut overrides = FieldOverrides::default();
        assert!(overrides.is_empty());
        assert!(overrides.set("cgpa", "9.0".to_string()));
        assert!(!overrides.set("file", "ignored".to_string()));

        let base = ProfileFields {
            name: "Asha".to_string(),
            cgpa: "7.5".to_string(),
            ..ProfileFields::default()
        };
        let merged = overrides.apply_to(base);
        assert_eq!(merged.cgpa, "9.0");
        assert_eq!(merged.name, "Asha");
    }
}
