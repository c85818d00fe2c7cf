//! Single-candidate detailed workflow: parse, analyze, match, conditionally
//! enhance with bounded retries, QA review, human-review routing, and final
//! recommendation synthesis.
//!
//! Everything the loop needs to continue rides in [`WorkflowState`],
//! including the iteration counter; the counter only increments inside the
//! enhancing stage and the loop stops at the bound regardless of score.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ExtractionError, StateError, ValidationError};
use crate::matching::pipeline::{MatchOutcome, MatchingPipeline};
use crate::matching::scoring::RulesEngine;
use crate::oracle::{decode_best_effort, BestEffort, ExtractionOracle};
use crate::{CandidateProfile, JobRequirement, Severity};

pub const MAX_ENHANCEMENT_ITERATIONS: u32 = 3;

/// Scores at or above this skip enhancement entirely.
pub const ENHANCEMENT_SKIP_SCORE: f64 = 90.0;

/// Scores below this are not worth enhancing.
pub const ENHANCEMENT_REJECT_SCORE: f64 = 40.0;

/// Retry while the enhanced score is below this target...
pub const ENHANCEMENT_TARGET_SCORE: f64 = 85.0;

/// ...and each pass still improves by more than this.
pub const ENHANCEMENT_MIN_IMPROVEMENT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Started,
    Parsing,
    Parsed,
    AnalyzingJob,
    JobAnalyzed,
    Matching,
    Matched,
    Enhancing,
    Enhanced,
    QaCheck,
    QaPassed,
    QaFailed,
    HumanReview,
    Approved,
    Rejected,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanAction {
    Approve,
    Reject,
    Revise,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowError {
    pub stage: String,
    pub detail: String,
    pub severity: Severity,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct AtsScore {
    #[serde(default)]
    pub before: f64,
    #[serde(default)]
    pub after: f64,
}

/// Schema of the enhancement oracle call.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnhancementResult {
    #[serde(default)]
    pub ats_score: AtsScore,
    #[serde(default)]
    pub enhanced_resume: serde_json::Value,
    #[serde(default)]
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QaStatus {
    Approved,
    #[default]
    NeedsReview,
    Rejected,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QaApproval {
    #[serde(default)]
    pub status: QaStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QaIssue {
    pub text: String,
    #[serde(default)]
    pub severity: Severity,
}

/// Schema of the QA-review oracle call.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QaResult {
    #[serde(default)]
    pub approval: QaApproval,
    #[serde(default)]
    pub issues: Vec<QaIssue>,
}

impl QaResult {
    pub fn has_critical_issue(&self) -> bool {
        self.issues.iter().any(|issue| issue.severity == Severity::Critical)
    }
}

/// Parse-stage confidence, as reported inside the parsed resume payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseConfidence {
    #[serde(default = "full_confidence")]
    pub overall: f64,
    #[serde(default)]
    pub needs_review: Vec<String>,
}

fn full_confidence() -> f64 {
    100.0
}

impl Default for ParseConfidence {
    fn default() -> Self {
        ParseConfidence {
            overall: full_confidence(),
            needs_review: Vec::new(),
        }
    }
}

/// Accumulated state of one detailed workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub status: WorkflowStatus,
    pub resume_text: String,
    pub job_description: String,
    pub candidate: Option<CandidateProfile>,
    pub job: Option<JobRequirement>,
    pub parsed_resume: Option<serde_json::Value>,
    pub analyzed_job: Option<serde_json::Value>,
    pub match_outcome: Option<MatchOutcome>,
    pub match_score: Option<f64>,
    pub enhanced: Option<EnhancementResult>,
    pub qa_result: Option<QaResult>,
    /// Per-stage confidence in [0, 100].
    pub confidence_scores: BTreeMap<String, f64>,
    pub fields_needing_review: Vec<String>,
    /// Enhancement passes taken so far; bounded at
    /// [`MAX_ENHANCEMENT_ITERATIONS`].
    pub iterations: u32,
    pub human_action: Option<HumanAction>,
    pub errors: Vec<WorkflowError>,
    pub final_recommendation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(resume_text: &str, job_description: &str) -> WorkflowState {
        let now = Utc::now();
        WorkflowState {
            status: WorkflowStatus::Started,
            resume_text: resume_text.to_string(),
            job_description: job_description.to_string(),
            candidate: None,
            job: None,
            parsed_resume: None,
            analyzed_job: None,
            match_outcome: None,
            match_score: None,
            enhanced: None,
            qa_result: None,
            confidence_scores: BTreeMap::new(),
            fields_needing_review: Vec::new(),
            iterations: 0,
            human_action: None,
            errors: Vec::new(),
            final_recommendation: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Appends; never overwrites earlier errors.
    pub fn add_error(&mut self, stage: &str, detail: String, severity: Severity) {
        self.errors.push(WorkflowError {
            stage: stage.to_string(),
            detail,
            severity,
            at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    pub fn record_confidence(&mut self, stage: &str, confidence: f64) {
        self.confidence_scores.insert(stage.to_string(), confidence);
    }

    /// Average of the per-stage confidences, 0 when nothing has run.
    pub fn overall_confidence(&self) -> f64 {
        if self.confidence_scores.is_empty() {
            return 0.0;
        }
        self.confidence_scores.values().sum::<f64>() / self.confidence_scores.len() as f64
    }
}

/// Where to go after the parse stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterParsing {
    AnalyzeJob,
    HumanReview,
    End,
}

/// With a job in hand, low parse confidence goes to a human; without one,
/// the bar is higher and flagged fields also route to review.
pub fn route_after_parsing(
    confidence: &ParseConfidence,
    has_job_description: bool,
) -> AfterParsing {
    if has_job_description {
        if confidence.overall < 50.0 {
            AfterParsing::HumanReview
        } else {
            AfterParsing::AnalyzeJob
        }
    } else if confidence.overall < 70.0 || !confidence.needs_review.is_empty() {
        AfterParsing::HumanReview
    } else {
        AfterParsing::End
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterMatching {
    SkipToQa,
    Enhance,
    Reject,
}

pub fn route_after_matching(match_score: f64) -> AfterMatching {
    if match_score >= ENHANCEMENT_SKIP_SCORE {
        AfterMatching::SkipToQa
    } else if match_score < ENHANCEMENT_REJECT_SCORE {
        AfterMatching::Reject
    } else {
        AfterMatching::Enhance
    }
}

/// Retry only while below target, still improving meaningfully, and under
/// the iteration bound.
pub fn should_retry_enhancement(result: &EnhancementResult, iterations: u32) -> bool {
    iterations < MAX_ENHANCEMENT_ITERATIONS
        && result.ats_score.after < ENHANCEMENT_TARGET_SCORE
        && (result.ats_score.after - result.ats_score.before) > ENHANCEMENT_MIN_IMPROVEMENT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterQa {
    HumanReview,
    Complete,
}

pub fn route_after_qa(qa: &QaResult) -> AfterQa {
    match qa.approval.status {
        QaStatus::NeedsReview => AfterQa::HumanReview,
        QaStatus::Rejected if qa.has_critical_issue() => AfterQa::HumanReview,
        _ => AfterQa::Complete,
    }
}

/// Final recommendation bands. Echoes the already-computed match level and
/// recommendation rather than re-deriving them.
pub fn synthesize_recommendation(state: &WorkflowState) -> String {
    let score = state.match_score.unwrap_or(0.0);
    let confidence = state.overall_confidence();
    let (level, recommendation) = state
        .match_outcome
        .as_ref()
        .map(|m| (m.level.as_str(), m.recommendation.as_str()))
        .unwrap_or(("unknown", "REVIEW REQUIRED"));

    if score >= 85.0 && confidence >= 80.0 {
        format!(
            "STRONG HIRE: {level} match at {score:.0}% with {confidence:.0}% confidence. {recommendation}."
        )
    } else if score >= 70.0 {
        format!(
            "CONSIDER: {level} match at {score:.0}%. Review the identified gaps before interviewing. {recommendation}."
        )
    } else if score >= 50.0 {
        format!(
            "WEAK MATCH: {level} match at {score:.0}%. Significant gaps; consider only if the pool is thin. {recommendation}."
        )
    } else {
        format!(
            "NOT RECOMMENDED: {level} match at {score:.0}%. Candidate does not meet key requirements. {recommendation}."
        )
    }
}

/// Drives the detailed single-candidate workflow against an oracle.
pub struct EnhancementLoop {
    pipeline: MatchingPipeline,
}

impl EnhancementLoop {
    pub fn new(engine: RulesEngine) -> EnhancementLoop {
        EnhancementLoop {
            pipeline: MatchingPipeline::new(engine),
        }
    }

    /// Runs the workflow until it completes, fails, or pauses at human
    /// review. A paused state is continued with
    /// [`EnhancementLoop::resume_with_human_action`].
    pub async fn run(
        &self,
        resume_text: &str,
        job_description: &str,
        oracle: &dyn ExtractionOracle,
    ) -> Result<WorkflowState, ValidationError> {
        if resume_text.trim().is_empty() {
            return Err(ValidationError::MissingInput("resume text"));
        }
        let mut state = WorkflowState::new(resume_text, job_description);

        // parse
        state.set_status(WorkflowStatus::Parsing);
        let parsed = match oracle.parse_candidate(resume_text).await {
            Ok(raw) => match decode_best_effort::<serde_json::Value>(&raw) {
                BestEffort::Parsed(parsed) => parsed,
                BestEffort::Unparsed { reason, .. } => {
                    fail(&mut state, "parser", ExtractionError::Malformed(reason));
                    return Ok(state);
                }
            },
            Err(err) => {
                fail(&mut state, "parser", err);
                return Ok(state);
            }
        };
        let confidence: ParseConfidence = parsed
            .get("confidence")
            .map(|value| serde_json::from_value(value.clone()).unwrap_or_default())
            .unwrap_or_default();
        state.candidate = Some(CandidateProfile::from_parsed("workflow_candidate", &parsed));
        state.parsed_resume = Some(parsed);
        state.record_confidence("parser", confidence.overall);
        state.fields_needing_review = confidence.needs_review.clone();
        state.set_status(WorkflowStatus::Parsed);

        match route_after_parsing(&confidence, !job_description.trim().is_empty()) {
            AfterParsing::End => {
                info!("no job description; workflow ends after parsing");
                return Ok(state);
            }
            AfterParsing::HumanReview => {
                warn!(confidence = confidence.overall, "low parse confidence; pausing for human review");
                state.set_status(WorkflowStatus::HumanReview);
                return Ok(state);
            }
            AfterParsing::AnalyzeJob => {}
        }

        // analyze job
        state.set_status(WorkflowStatus::AnalyzingJob);
        let analyzed = match oracle.analyze_job(job_description).await {
            Ok(raw) => match decode_best_effort::<serde_json::Value>(&raw) {
                BestEffort::Parsed(analyzed) => analyzed,
                BestEffort::Unparsed { reason, .. } => {
                    fail(&mut state, "job_analyzer", ExtractionError::Malformed(reason));
                    return Ok(state);
                }
            },
            Err(err) => {
                fail(&mut state, "job_analyzer", err);
                return Ok(state);
            }
        };
        state.job = Some(JobRequirement::from_analyzed(
            "workflow_job",
            job_description,
            &analyzed,
        ));
        state.analyzed_job = Some(analyzed);
        state.record_confidence("job_analyzer", 85.0);
        state.set_status(WorkflowStatus::JobAnalyzed);

        // match
        state.set_status(WorkflowStatus::Matching);
        let (Some(candidate), Some(job)) = (state.candidate.clone(), state.job.clone()) else {
            // both were just set above
            fail(
                &mut state,
                "matcher",
                ExtractionError::Malformed("candidate or job missing before matching".to_string()),
            );
            return Ok(state);
        };
        let outcome = self.pipeline.match_one(&candidate, &job, oracle).await;
        state.record_confidence("matcher", if outcome.degraded { 40.0 } else { 90.0 });
        state.match_score = Some(outcome.weighted_score);
        state.match_outcome = Some(outcome);
        state.set_status(WorkflowStatus::Matched);

        let score = state.match_score.unwrap_or(0.0);
        match route_after_matching(score) {
            AfterMatching::Reject => {
                info!(score, "match too weak to enhance; rejecting");
                state.set_status(WorkflowStatus::Rejected);
                state.final_recommendation = Some(synthesize_recommendation(&state));
                return Ok(state);
            }
            AfterMatching::SkipToQa => {
                info!(score, "match already strong; skipping enhancement");
            }
            AfterMatching::Enhance => {
                if !self.run_enhancement_phase(&mut state, &candidate, &job, oracle).await {
                    return Ok(state);
                }
            }
        }

        self.run_qa_phase(&mut state, &candidate, oracle).await;
        Ok(state)
    }

    /// Continues a workflow paused at human review.
    pub async fn resume_with_human_action(
        &self,
        mut state: WorkflowState,
        action: HumanAction,
        oracle: &dyn ExtractionOracle,
    ) -> Result<WorkflowState, StateError> {
        if state.status != WorkflowStatus::HumanReview {
            return Err(StateError::InvalidTransition {
                from: "non-human-review state",
                to: "human action",
            });
        }
        state.human_action = Some(action);

        match action {
            HumanAction::Approve => {
                state.set_status(WorkflowStatus::Approved);
                complete(&mut state);
            }
            HumanAction::Reject => {
                state.set_status(WorkflowStatus::Rejected);
                state.final_recommendation = Some(synthesize_recommendation(&state));
            }
            HumanAction::Revise => {
                match (state.candidate.clone(), state.job.clone()) {
                    (Some(candidate), Some(job))
                        if state.iterations < MAX_ENHANCEMENT_ITERATIONS =>
                    {
                        if self.run_enhancement_phase(&mut state, &candidate, &job, oracle).await {
                            self.run_qa_phase(&mut state, &candidate, oracle).await;
                        }
                    }
                    _ => {
                        info!(iterations = state.iterations, "revision not possible; completing");
                        complete(&mut state);
                    }
                }
            }
        }
        Ok(state)
    }

    /// Bounded enhancement loop. Returns false when the workflow failed and
    /// must stop.
    async fn run_enhancement_phase(
        &self,
        state: &mut WorkflowState,
        candidate: &CandidateProfile,
        job: &JobRequirement,
        oracle: &dyn ExtractionOracle,
    ) -> bool {
        loop {
            state.set_status(WorkflowStatus::Enhancing);
            state.iterations += 1;
            let raw = match oracle.enhance_resume(candidate, job, state.iterations).await {
                Ok(raw) => raw,
                Err(err) => {
                    fail(state, "enhancer", err);
                    return false;
                }
            };
            let result = match decode_best_effort::<EnhancementResult>(&raw) {
                BestEffort::Parsed(result) => result,
                BestEffort::Unparsed { reason, .. } => {
                    // unusable enhancement output is not fatal: keep the
                    // last good version and move on to QA
                    warn!(iteration = state.iterations, reason = reason.as_str(), "enhancement output did not decode; stopping the loop");
                    state.add_error("enhancer", reason, Severity::Medium);
                    state.set_status(WorkflowStatus::Enhanced);
                    return true;
                }
            };
            state.record_confidence("enhancer", 90.0);
            state.set_status(WorkflowStatus::Enhanced);
            let retry = should_retry_enhancement(&result, state.iterations);
            info!(
                iteration = state.iterations,
                before = result.ats_score.before,
                after = result.ats_score.after,
                retry,
                "enhancement pass finished"
            );
            state.enhanced = Some(result);
            if !retry {
                return true;
            }
        }
    }

    async fn run_qa_phase(
        &self,
        state: &mut WorkflowState,
        candidate: &CandidateProfile,
        oracle: &dyn ExtractionOracle,
    ) {
        state.set_status(WorkflowStatus::QaCheck);
        let subject = state
            .enhanced
            .as_ref()
            .map(|e| e.enhanced_resume.clone())
            .or_else(|| state.parsed_resume.clone())
            .unwrap_or(serde_json::Value::Null);

        let qa = match oracle.review_quality(candidate, &subject).await {
            Ok(raw) => match decode_best_effort::<QaResult>(&raw) {
                BestEffort::Parsed(qa) => qa,
                BestEffort::Unparsed { reason, .. } => {
                    // undecodable review defaults to needs_review: a human
                    // looks instead of trusting a blind pass
                    state.add_error("qa", reason, Severity::Medium);
                    QaResult::default()
                }
            },
            Err(err) => {
                fail(state, "qa", err);
                return;
            }
        };

        state.record_confidence("qa", 85.0);
        let passed = qa.approval.status == QaStatus::Approved;
        state.set_status(if passed {
            WorkflowStatus::QaPassed
        } else {
            WorkflowStatus::QaFailed
        });
        let route = route_after_qa(&qa);
        state.qa_result = Some(qa);
        match route {
            AfterQa::HumanReview => state.set_status(WorkflowStatus::HumanReview),
            AfterQa::Complete => complete(state),
        }
    }
}

fn complete(state: &mut WorkflowState) {
    state.set_status(WorkflowStatus::Completed);
    state.final_recommendation = Some(synthesize_recommendation(state));
}

/// Oracle failure at any stage: record the error and stop at `failed` with
/// everything accumulated so far intact.
fn fail(state: &mut WorkflowState, stage: &str, err: ExtractionError) {
    warn!(stage, error = %err, "workflow stage failed");
    state.add_error(stage, err.to_string(), Severity::High);
    state.set_status(WorkflowStatus::Failed);
}
