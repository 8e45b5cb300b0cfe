//! Composes embeddable text from structured resume and job records.
//!
//! Sections are emitted in a fixed order with stable headings so that two records with
//! the same content always compose to the same text (and the same fingerprint).
//! Absent or empty sections are skipped.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use super::UnitId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    #[serde(default)]
    pub proficiency: Option<String>,
    #[serde(default)]
    pub years: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub duration_months: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub degree: String,
    #[serde(default)]
    pub field_of_study: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub id: UnitId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub skills: Vec<SkillEntry>,
    #[serde(default)]
    pub experiences: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
}

impl ResumeProfile {
    /// Skills first: they carry most of the matching signal.
    pub fn compose(&self) -> String {
        let mut text = String::new();

        if let Some(name) = non_empty(&self.full_name) {
            let _ = writeln!(text, "Candidate: {}\n", name);
        }

        if !self.skills.is_empty() {
            text.push_str("Technical Skills:\n");
            for skill in &self.skills {
                let _ = write!(text, "- {}", skill.name);
                if let Some(level) = non_empty(&skill.proficiency) {
                    let _ = write!(text, " ({})", level);
                }
                if let Some(years) = skill.years {
                    let _ = write!(text, " - {} years", years);
                }
                text.push('\n');
            }
            text.push('\n');
        }

        if !self.experiences.is_empty() {
            text.push_str("Professional Experience:\n");
            for exp in &self.experiences {
                let _ = write!(text, "- {}", exp.title);
                if let Some(company) = non_empty(&exp.company) {
                    let _ = write!(text, " at {}", company);
                }
                if let Some(months) = exp.duration_months {
                    let _ = write!(text, " ({} months)", months);
                }
                if let Some(desc) = non_empty(&exp.description) {
                    let _ = write!(text, ": {}", desc);
                }
                text.push('\n');
            }
            text.push('\n');
        }

        if !self.education.is_empty() {
            text.push_str("Education:\n");
            for edu in &self.education {
                let _ = write!(text, "- {}", edu.degree);
                if let Some(field) = non_empty(&edu.field_of_study) {
                    let _ = write!(text, " in {}", field);
                }
                if let Some(school) = non_empty(&edu.institution) {
                    let _ = write!(text, " from {}", school);
                }
                text.push('\n');
            }
            text.push('\n');
        }

        if let Some(summary) = non_empty(&self.summary) {
            let _ = writeln!(text, "Professional Summary:\n{}", summary);
        }

        text.trim().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredSkill {
    pub name: String,
    #[serde(default)]
    pub min_years: Option<u32>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProfile {
    pub id: UnitId,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<RequiredSkill>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub min_years_experience: Option<u32>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub employment_type: Option<String>,
    #[serde(default)]
    pub remote_type: Option<String>,
}

impl JobProfile {
    pub fn compose(&self) -> String {
        let mut text = String::new();

        if !self.title.trim().is_empty() {
            let _ = writeln!(text, "Job Title: {}\n", self.title);
        }
        if let Some(company) = non_empty(&self.company) {
            let _ = writeln!(text, "Company: {}", company);
        }
        if let Some(location) = non_empty(&self.location) {
            let _ = writeln!(text, "Location: {}\n", location);
        }
        if let Some(desc) = non_empty(&self.description) {
            let _ = writeln!(text, "Job Description:\n{}\n", desc);
        }

        if !self.required_skills.is_empty() {
            text.push_str("Required Skills:\n");
            for skill in &self.required_skills {
                let _ = write!(text, "- {}", skill.name);
                if let Some(years) = skill.min_years {
                    let _ = write!(text, " ({}+ years)", years);
                }
                if let Some(priority) = non_empty(&skill.priority) {
                    let _ = write!(text, " [{} priority]", priority);
                }
                text.push('\n');
            }
            text.push('\n');
        }

        if !self.preferred_skills.is_empty() {
            text.push_str("Preferred Skills:\n");
            for skill in &self.preferred_skills {
                let _ = writeln!(text, "- {}", skill);
            }
            text.push('\n');
        }

        if let Some(years) = self.min_years_experience {
            let _ = writeln!(text, "Experience Required: {}+ years", years);
        }
        if let Some(level) = non_empty(&self.education_level) {
            let _ = writeln!(text, "Education: {}", level);
        }
        if let Some(kind) = non_empty(&self.employment_type) {
            let _ = writeln!(text, "Employment Type: {}", kind);
        }
        if let Some(remote) = non_empty(&self.remote_type) {
            let _ = writeln!(text, "Remote: {}", remote);
        }

        text.trim().to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
