//! Placement overview for the training and placement officer: filtered
//! student lists and aggregate counts.
//!
//! Branch and skills are compared upper-cased, matching how they are shown.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::profile::StudentProfile;

/// Band labels in display order, paired with their exclusive upper bound.
const CGPA_BANDS: &[(&str, f64)] = &[
    ("< 6.0", 6.0),
    ("6.0 - 7.0", 7.0),
    ("7.0 - 8.0", 8.0),
    ("8.0 - 9.0", 9.0),
    ("> 9.0", f64::INFINITY),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    #[default]
    All,
    Placed,
    NotPlaced,
}

/// Raw query string; blank values mean "no filter".
#[derive(Debug, Default, Deserialize)]
pub struct StudentQuery {
    pub cgpa_min: Option<String>,
    pub branch: Option<String>,
    pub skill: Option<String>,
    #[serde(default)]
    pub status: PlacementStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentFilter {
    pub cgpa_min: Option<f64>,
    pub branch: Option<String>,
    pub skill: Option<String>,
    pub status: PlacementStatus,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl StudentFilter {
    pub fn from_query(query: StudentQuery) -> Result<Self, String> {
        let cgpa_min = match non_blank(query.cgpa_min) {
            Some(v) => Some(
                v.parse::<f64>()
                    .map_err(|_| format!("cgpa_min must be a number, got '{v}'"))?,
            ),
            None => None,
        };
        Ok(Self {
            cgpa_min,
            branch: non_blank(query.branch).map(|b| b.to_uppercase()),
            skill: non_blank(query.skill).map(|s| s.to_uppercase()),
            status: query.status,
        })
    }

    /// Expects a student already passed through `normalize`.
    pub fn matches(&self, student: &StudentProfile) -> bool {
        if let Some(min) = self.cgpa_min {
            // Non-numeric CGPA never satisfies a minimum.
            match parse_cgpa(&student.cgpa) {
                Some(cgpa) if cgpa >= min => {}
                _ => return false,
            }
        }
        if let Some(branch) = &self.branch {
            if !student.branch.contains(branch.as_str()) {
                return false;
            }
        }
        if let Some(skill) = &self.skill {
            if !student.skills.iter().any(|s| s.contains(skill.as_str())) {
                return false;
            }
        }
        match self.status {
            PlacementStatus::All => true,
            PlacementStatus::Placed => student.is_placed,
            PlacementStatus::NotPlaced => !student.is_placed,
        }
    }
}

/// Upper-cases branch and skills for display and matching.
pub fn normalize(mut student: StudentProfile) -> StudentProfile {
    student.branch = student.branch.to_uppercase();
    student.skills = student.skills.iter().map(|s| s.to_uppercase()).collect();
    student
}

fn parse_cgpa(cgpa: &str) -> Option<f64> {
    cgpa.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub placed: usize,
}

impl Tally {
    fn add(&mut self, placed: bool) {
        self.total += 1;
        if placed {
            self.placed += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CgpaBand {
    pub label: &'static str,
    #[serde(flatten)]
    pub tally: Tally,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementStats {
    pub total: usize,
    pub placed: usize,
    pub not_placed: usize,
    pub branches: BTreeMap<String, Tally>,
    pub cgpa_bands: Vec<CgpaBand>,
}

pub fn compute_stats(students: &[StudentProfile]) -> PlacementStats {
    let mut branches: BTreeMap<String, Tally> = BTreeMap::new();
    let mut bands: Vec<CgpaBand> = CGPA_BANDS
        .iter()
        .map(|&(label, _)| CgpaBand {
            label,
            tally: Tally::default(),
        })
        .collect();

    for s in students {
        let branch = s.branch.trim().to_uppercase();
        if !branch.is_empty() {
            branches.entry(branch).or_default().add(s.is_placed);
        }
        if let Some(cgpa) = parse_cgpa(&s.cgpa) {
            if let Some(i) = CGPA_BANDS.iter().position(|(_, upper)| cgpa < *upper) {
                bands[i].tally.add(s.is_placed);
            }
        }
    }

    let placed = students.iter().filter(|s| s.is_placed).count();
    PlacementStats {
        total: students.len(),
        placed,
        not_placed: students.len() - placed,
        branches,
        cgpa_bands: bands,
    }
}
