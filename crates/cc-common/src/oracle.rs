//! The structured-extraction oracle boundary.
//!
//! Every "intelligent" step (resume parsing, job analysis, component
//! scoring, enhancement, QA review) goes through [`ExtractionOracle`]. The
//! oracle is untrusted: it returns raw text that may or may not decode into
//! the expected schema, so decoding yields an explicit [`BestEffort`] value
//! instead of an error path — garbage output is expected control flow here.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::matching::scoring::ComponentScores;
use crate::{CandidateProfile, JobRequirement, Severity};

/// External extraction service. Implementations own prompting, transport,
/// timeouts, and retries; errors they return are per-item and never
/// batch-fatal.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    /// Analyzes a free-text job description into a structured JSON object.
    async fn analyze_job(&self, job_text: &str) -> Result<String, ExtractionError>;

    /// Parses free resume text into a structured JSON object.
    async fn parse_candidate(&self, resume_text: &str) -> Result<String, ExtractionError>;

    /// Scores one candidate against one job: component scores plus
    /// strengths/gaps/reasoning.
    async fn score_match(
        &self,
        candidate: &CandidateProfile,
        job: &JobRequirement,
    ) -> Result<String, ExtractionError>;

    /// Rewrites a resume toward a job. `iteration` is 1-based.
    async fn enhance_resume(
        &self,
        candidate: &CandidateProfile,
        job: &JobRequirement,
        iteration: u32,
    ) -> Result<String, ExtractionError>;

    /// Quality-reviews an enhanced resume against the original.
    async fn review_quality(
        &self,
        candidate: &CandidateProfile,
        enhanced: &serde_json::Value,
    ) -> Result<String, ExtractionError>;
}

/// Outcome of decoding untrusted oracle text: either the expected schema or
/// the raw text with the decode failure, forcing call sites to handle both.
#[derive(Debug, Clone)]
pub enum BestEffort<T> {
    Parsed(T),
    Unparsed { raw: String, reason: String },
}

impl<T> BestEffort<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, BestEffort::Parsed(_))
    }
}

/// Decodes oracle text into `T`, stripping the markdown code fences models
/// like to wrap JSON in.
pub fn decode_best_effort<T: DeserializeOwned>(raw: &str) -> BestEffort<T> {
    let trimmed = strip_code_fences(raw);
    match serde_json::from_str(trimmed) {
        Ok(value) => BestEffort::Parsed(value),
        Err(err) => BestEffort::Unparsed {
            raw: raw.to_string(),
            reason: err.to_string(),
        },
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the language tag on the opening fence, if any
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn neutral_component() -> f64 {
    50.0
}

/// A gap as the oracle reports it: a bare string or an annotated object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GapEntry {
    Detailed {
        text: String,
        #[serde(default)]
        severity: Severity,
    },
    Plain(String),
}

impl GapEntry {
    pub fn text(&self) -> &str {
        match self {
            GapEntry::Plain(text) => text,
            GapEntry::Detailed { text, .. } => text,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            GapEntry::Plain(_) => Severity::Medium,
            GapEntry::Detailed { severity, .. } => *severity,
        }
    }
}

/// Schema of the match-scoring oracle call. Every field is defaulted; a
/// payload missing a score gets the neutral 50.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchAssessment {
    #[serde(default = "neutral_component")]
    pub job_title_match_score: f64,
    #[serde(default = "neutral_component")]
    pub skills_score: f64,
    #[serde(default = "neutral_component")]
    pub experience_score: f64,
    #[serde(default = "neutral_component")]
    pub profile_description_match_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<GapEntry>,
    #[serde(default)]
    pub reasoning: String,
}

impl MatchAssessment {
    /// Degraded stand-in used when the oracle call failed or its payload
    /// would not decode: all components neutral, reasoning names the cause.
    pub fn neutral(detail: &str) -> MatchAssessment {
        MatchAssessment {
            job_title_match_score: 50.0,
            skills_score: 50.0,
            experience_score: 50.0,
            profile_description_match_score: 50.0,
            strengths: Vec::new(),
            gaps: Vec::new(),
            reasoning: format!("parse failure: {detail}"),
        }
    }

    /// Components as the open map the aggregator consumes, clamped to
    /// [0, 100].
    pub fn component_scores(&self) -> ComponentScores {
        let clamp = |v: f64| v.clamp(0.0, 100.0);
        BTreeMap::from([
            ("experience".to_string(), clamp(self.experience_score)),
            ("job_title_match".to_string(), clamp(self.job_title_match_score)),
            (
                "profile_description_match".to_string(),
                clamp(self.profile_description_match_score),
            ),
            ("skills".to_string(), clamp(self.skills_score)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn decode_handles_fenced_json() {
        let raw = "```json\n{\"skills_score\": 72}\n```";
        let decoded = decode_best_effort::<MatchAssessment>(raw);
        let BestEffort::Parsed(assessment) = decoded else {
            panic!("expected parsed");
        };
        assert_eq!(assessment.skills_score, 72.0);
        assert_eq!(assessment.experience_score, 50.0); // defaulted
    }

    #[test]
    fn decode_keeps_raw_text_on_failure() {
        let decoded = decode_best_effort::<Value>("I am sorry, I cannot do that");
        let BestEffort::Unparsed { raw, reason } = decoded else {
            panic!("expected unparsed");
        };
        assert!(raw.contains("sorry"));
        assert!(!reason.is_empty());
    }

    #[test]
    fn gaps_decode_as_strings_or_objects() {
        let raw = r#"{"gaps": ["no Kubernetes", {"text": "missing degree", "severity": "critical"}]}"#;
        let BestEffort::Parsed(assessment) = decode_best_effort::<MatchAssessment>(raw) else {
            panic!("expected parsed");
        };
        assert_eq!(assessment.gaps.len(), 2);
        assert_eq!(assessment.gaps[0].text(), "no Kubernetes");
        assert_eq!(assessment.gaps[0].severity(), Severity::Medium);
        assert_eq!(assessment.gaps[1].severity(), Severity::Critical);
    }

    #[test]
    fn component_scores_clamp_out_of_range_values() {
        let raw = r#"{"skills_score": 140, "experience_score": -10}"#;
        let BestEffort::Parsed(assessment) = decode_best_effort::<MatchAssessment>(raw) else {
            panic!("expected parsed");
        };
        let scores = assessment.component_scores();
        assert_eq!(scores["skills"], 100.0);
        assert_eq!(scores["experience"], 0.0);
    }

    #[test]
    fn neutral_assessment_carries_the_failure_detail() {
        let neutral = MatchAssessment::neutral("timed out");
        assert_eq!(neutral.reasoning, "parse failure: timed out");
        assert!(neutral.component_scores().values().all(|s| *s == 50.0));
    }
}
