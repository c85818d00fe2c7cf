//! One candidate against one job: gates, oracle component scores, weighted
//! aggregation, tier classification.

use serde::Serialize;
use tracing::{debug, warn};

use crate::matching::gates::{run_deal_breakers, ExclusionReason};
use crate::matching::location::LocationScore;
use crate::matching::scoring::{AutoRejectInput, ComponentScores, RulesEngine};
use crate::matching::work_auth::WorkAuthCheck;
use crate::oracle::{decode_best_effort, BestEffort, ExtractionOracle, MatchAssessment};
use crate::{CandidateProfile, JobRequirement, Severity};

#[derive(Debug, Clone, Serialize)]
pub struct Gap {
    pub text: String,
    pub severity: Severity,
}

/// The full result of matching one candidate against one job.
///
/// Immutable once produced. Exclusion and auto-reject are metadata only:
/// the weighted score always reflects the full computation, and downstream
/// consumers decide whether to hide flagged candidates.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub candidate_id: String,
    pub candidate_name: String,
    pub job_id: String,
    pub component_scores: ComponentScores,
    pub weighted_score: f64,
    /// What the candidate would score absent any deal breaker. Identical to
    /// `weighted_score` because exclusion never mutates the score; kept as
    /// its own field so exports can render it without knowing that rule.
    pub potential_score: f64,
    pub excluded: bool,
    pub exclusion_reason: Option<ExclusionReason>,
    pub level: String,
    pub recommendation: String,
    pub action: String,
    pub strengths: Vec<String>,
    pub gaps: Vec<Gap>,
    pub reasoning: String,
    /// Set when the oracle payload was unusable and neutral component
    /// scores were substituted.
    pub degraded: bool,
    #[serde(skip)]
    pub location: LocationScore,
    #[serde(skip)]
    pub work_auth: WorkAuthCheck,
    pub auto_reject_reason: Option<String>,
    /// 1-based, assigned by the batch ranking stage.
    pub rank: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MatchingPipeline {
    engine: RulesEngine,
}

impl MatchingPipeline {
    pub fn new(engine: RulesEngine) -> MatchingPipeline {
        MatchingPipeline { engine }
    }

    pub fn engine(&self) -> &RulesEngine {
        &self.engine
    }

    /// Matches one candidate against one (already analyzed) job.
    ///
    /// Never fails: oracle trouble degrades this one result to neutral
    /// component scores and flags it, deterministic rule evaluation cannot
    /// throw.
    pub async fn match_one(
        &self,
        candidate: &CandidateProfile,
        job: &JobRequirement,
        oracle: &dyn ExtractionOracle,
    ) -> MatchOutcome {
        // deal breakers first: cheap, no oracle call
        let gates = run_deal_breakers(self.engine.config(), candidate, job);

        let (assessment, degraded) = match oracle.score_match(candidate, job).await {
            Ok(raw) => match decode_best_effort::<MatchAssessment>(&raw) {
                BestEffort::Parsed(assessment) => (assessment, false),
                BestEffort::Unparsed { reason, .. } => {
                    warn!(
                        candidate = candidate.id.as_str(),
                        job = job.id.as_str(),
                        reason = reason.as_str(),
                        "match assessment did not decode; substituting neutral scores"
                    );
                    (MatchAssessment::neutral(&reason), true)
                }
            },
            Err(err) => {
                warn!(
                    candidate = candidate.id.as_str(),
                    job = job.id.as_str(),
                    error = %err,
                    "match scoring call failed; substituting neutral scores"
                );
                (MatchAssessment::neutral(&err.to_string()), true)
            }
        };

        let component_scores = assessment.component_scores();
        let weighted_score = self.engine.aggregate_weighted_score(&component_scores);
        // exclusion is metadata, never a score mutation, so the potential
        // score is the same computation
        let potential_score = weighted_score;
        let tier = self.engine.classify_recommendation(weighted_score);

        let skills_match_pct = component_scores.get("skills").copied().unwrap_or(50.0);
        let auto_reject_reason = self.engine.should_auto_reject(AutoRejectInput {
            location_score: f64::from(gates.location.score),
            skills_match_pct,
            experience_gap_years: candidate.experience_years - job.experience_years,
            willing_to_relocate: candidate.willing_to_relocate,
            is_senior_role: job.is_senior_role,
        });

        debug!(
            candidate = candidate.id.as_str(),
            job = job.id.as_str(),
            score = weighted_score,
            excluded = gates.excluded(),
            degraded,
            "matched candidate"
        );

        MatchOutcome {
            candidate_id: candidate.id.clone(),
            candidate_name: candidate.name.clone(),
            job_id: job.id.clone(),
            component_scores,
            weighted_score,
            potential_score,
            excluded: gates.excluded(),
            exclusion_reason: gates.exclusion,
            level: tier.level,
            recommendation: tier.recommendation,
            action: tier.action,
            strengths: assessment.strengths,
            gaps: assessment
                .gaps
                .iter()
                .map(|g| Gap {
                    text: g.text().to_string(),
                    severity: g.severity(),
                })
                .collect(),
            reasoning: assessment.reasoning,
            degraded,
            location: gates.location,
            work_auth: gates.work_auth,
            auto_reject_reason,
            rank: None,
        }
    }
}
