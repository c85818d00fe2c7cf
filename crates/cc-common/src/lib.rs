//! CareerCraft core: deterministic candidate/job matching rules, the batch
//! orchestrator, and the single-candidate enhancement workflow.
//!
//! All LLM access goes through the [`oracle::ExtractionOracle`] boundary; the
//! rest of this crate is pure, synchronous rule evaluation plus the async
//! orchestration that sequences oracle calls around it.

pub mod batch;
pub mod error;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod matching;
pub mod oracle;
pub mod rules;
pub mod text;
pub mod workflow;

use serde::{Deserialize, Serialize};

/// Work arrangement of a job, or the arrangement a candidate prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Remote,
    Hybrid,
    Onsite,
    Flexible,
}

impl LocationType {
    /// Title-cased name used as the lookup key in the compatibility matrix.
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Remote => "Remote",
            LocationType::Hybrid => "Hybrid",
            LocationType::Onsite => "Onsite",
            LocationType::Flexible => "Flexible",
        }
    }

    /// Case-insensitive parse of the four known arrangements.
    pub fn parse(raw: &str) -> Option<LocationType> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" => Some(LocationType::Remote),
            "hybrid" => Some(LocationType::Hybrid),
            "onsite" | "on-site" | "on site" => Some(LocationType::Onsite),
            "flexible" | "any" => Some(LocationType::Flexible),
            _ => None,
        }
    }
}

/// Whether a job will sponsor a work visa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorshipPolicy {
    #[default]
    FullSponsorship,
    NoSponsorship,
    CaseByCase,
}

impl SponsorshipPolicy {
    pub fn parse(raw: &str) -> Option<SponsorshipPolicy> {
        match raw.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "full_sponsorship" | "sponsorship" | "yes" => Some(SponsorshipPolicy::FullSponsorship),
            "no_sponsorship" | "none" | "no" => Some(SponsorshipPolicy::NoSponsorship),
            "case_by_case" | "case_by_case_basis" => Some(SponsorshipPolicy::CaseByCase),
            _ => None,
        }
    }
}

/// Severity attached to a gap or workflow error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A candidate as ingested from a spreadsheet row or a parsed resume.
///
/// Created at ingestion, optionally enriched with `parsed_resume` during the
/// parse stage, and read-only for the remainder of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience_years: f64,
    #[serde(default)]
    pub domain: Option<String>,
    pub location_preference: LocationType,
    #[serde(default)]
    pub willing_to_relocate: bool,
    #[serde(default)]
    pub work_authorization: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub previous_roles: Option<String>,
    /// Raw resume text, when the candidate came in as a document rather than
    /// a structured row. Triggers the parse stage in a batch run.
    #[serde(default)]
    pub resume_text: Option<String>,
    /// Oracle-produced structured resume, when the parse stage has run.
    #[serde(default)]
    pub parsed_resume: Option<serde_json::Value>,
}

impl Default for CandidateProfile {
    fn default() -> Self {
        CandidateProfile {
            id: String::new(),
            name: String::new(),
            skills: Vec::new(),
            experience_years: 0.0,
            domain: None,
            location_preference: LocationType::Flexible,
            willing_to_relocate: false,
            work_authorization: None,
            email: None,
            phone: None,
            education: None,
            previous_roles: None,
            resume_text: None,
            parsed_resume: None,
        }
    }
}

impl CandidateProfile {
    /// Builds a profile from an oracle-parsed resume, tolerating any missing
    /// field. Every access is optional with a documented default; the raw
    /// value is kept on the profile for downstream consumers.
    pub fn from_parsed(id: &str, parsed: &serde_json::Value) -> CandidateProfile {
        let str_field = |key: &str| {
            parsed
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let skills = parsed
            .get("skills")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let experience_years = parsed
            .get("experience_years")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .max(0.0);
        let location_preference = str_field("location_preference")
            .as_deref()
            .and_then(LocationType::parse)
            .unwrap_or(LocationType::Flexible);
        CandidateProfile {
            id: id.to_string(),
            name: str_field("name").unwrap_or_else(|| "Unknown Candidate".to_string()),
            skills,
            experience_years,
            domain: str_field("domain"),
            location_preference,
            willing_to_relocate: parsed
                .get("willing_to_relocate")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            work_authorization: str_field("work_authorization"),
            email: str_field("email"),
            phone: str_field("phone"),
            education: str_field("education"),
            previous_roles: str_field("previous_roles"),
            resume_text: None,
            parsed_resume: Some(parsed.clone()),
        }
    }
}

/// A job opening, analyzed once per batch run and reused for every candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequirement {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    /// Minimum years of experience.
    #[serde(default)]
    pub experience_years: f64,
    #[serde(default)]
    pub is_senior_role: bool,
    pub location_type: LocationType,
    #[serde(default)]
    pub sponsorship_policy: SponsorshipPolicy,
    #[serde(default)]
    pub description: String,
    /// Oracle-produced structured analysis, filled in once per batch run.
    #[serde(default)]
    pub analyzed: Option<serde_json::Value>,
}

impl Default for JobRequirement {
    fn default() -> Self {
        JobRequirement {
            id: String::new(),
            title: String::new(),
            department: None,
            required_skills: Vec::new(),
            experience_years: 0.0,
            is_senior_role: false,
            location_type: LocationType::Remote,
            sponsorship_policy: SponsorshipPolicy::FullSponsorship,
            description: String::new(),
            analyzed: None,
        }
    }
}

impl JobRequirement {
    /// Builds a requirement from an oracle job analysis, tolerating missing
    /// fields the same way [`CandidateProfile::from_parsed`] does.
    pub fn from_analyzed(id: &str, description: &str, analyzed: &serde_json::Value) -> JobRequirement {
        let str_field = |key: &str| {
            analyzed
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let required_skills = analyzed
            .get("required_skills")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let title = str_field("title").unwrap_or_else(|| "Untitled Role".to_string());
        let seniority = str_field("seniority_level").unwrap_or_default().to_ascii_lowercase();
        JobRequirement {
            id: id.to_string(),
            is_senior_role: analyzed
                .get("is_senior_role")
                .and_then(|v| v.as_bool())
                .unwrap_or_else(|| seniority.contains("senior") || seniority.contains("lead")),
            title,
            department: str_field("department"),
            required_skills,
            experience_years: analyzed
                .get("experience_years")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0)
                .max(0.0),
            location_type: str_field("location_type")
                .as_deref()
                .and_then(LocationType::parse)
                .unwrap_or(LocationType::Remote),
            sponsorship_policy: str_field("sponsorship_policy")
                .as_deref()
                .and_then(SponsorshipPolicy::parse)
                .unwrap_or_default(),
            description: description.to_string(),
            analyzed: Some(analyzed.clone()),
        }
    }
}
