//! Candidate-row ingestion: the spreadsheet collaborator hands us loosely
//! typed rows; this module turns them into [`CandidateProfile`]s, tolerating
//! the free-text habits of real intake sheets.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{CandidateProfile, LocationType};

/// One row of a candidate sheet. Every non-name column is optional; missing
/// cells get documented defaults during conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateRow {
    pub name: String,
    #[serde(default)]
    pub skill_set: Option<String>,
    #[serde(default)]
    pub exp_years: Option<f64>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub location_preference: Option<String>,
    #[serde(default)]
    pub willing_to_relocate: Option<String>,
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
}

lazy_static! {
    static ref REMOTE_RE: Regex =
        Regex::new(r"(?i)\b(remote|work\s+from\s+home|wfh|telecommut\w*)\b").expect("static regex");
    static ref HYBRID_RE: Regex =
        Regex::new(r"(?i)\b(hybrid|\d\s*days?\s+(in|per)\s+(the\s+)?office)\b").expect("static regex");
    static ref ONSITE_RE: Regex =
        Regex::new(r"(?i)\b(on[\s-]?site|in[\s-]?office|in[\s-]?person)\b").expect("static regex");
}

/// Spreadsheet booleans arrive as prose.
pub fn truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1" | "willing"
    )
}

/// Splits a comma/semicolon-separated skill cell, dropping empties.
pub fn split_skills(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Maps a free-text preference cell onto [`LocationType`]: exact names
/// first, then keyword scan, `Flexible` when nothing matches.
pub fn normalize_location_preference(raw: &str) -> LocationType {
    if let Some(parsed) = LocationType::parse(raw) {
        return parsed;
    }
    if HYBRID_RE.is_match(raw) {
        LocationType::Hybrid
    } else if REMOTE_RE.is_match(raw) {
        LocationType::Remote
    } else if ONSITE_RE.is_match(raw) {
        LocationType::Onsite
    } else {
        LocationType::Flexible
    }
}

/// Converts a sheet row into a profile. The id is stable per input row so
/// re-running a batch over the same sheet reproduces the same ids.
pub fn candidate_from_row(index: usize, row: &CandidateRow) -> CandidateProfile {
    let clean = |cell: &Option<String>| {
        cell.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    CandidateProfile {
        id: format!("cand_{:04}", index + 1),
        name: if row.name.trim().is_empty() {
            format!("Candidate {}", index + 1)
        } else {
            row.name.trim().to_string()
        },
        skills: row.skill_set.as_deref().map(split_skills).unwrap_or_default(),
        experience_years: row.exp_years.unwrap_or(0.0).max(0.0),
        domain: clean(&row.domain),
        location_preference: row
            .location_preference
            .as_deref()
            .map(normalize_location_preference)
            .unwrap_or(LocationType::Flexible),
        willing_to_relocate: row.willing_to_relocate.as_deref().map(truthy).unwrap_or(false),
        work_authorization: clean(&row.work_authorization),
        email: clean(&row.email),
        phone: clean(&row.phone),
        education: clean(&row.education),
        previous_roles: clean(&row.previous_roles),
        resume_text: None,
        parsed_resume: None,
    }
}
