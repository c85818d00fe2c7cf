//! End-to-end batch and workflow tests against a scripted oracle.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use cc_common::batch::{BatchError, BatchOrchestrator, CancelFlag};
use cc_common::error::ExtractionError;
use cc_common::ingest::{candidate_from_row, CandidateRow};
use cc_common::matching::gates::ExclusionReason;
use cc_common::matching::scoring::RulesEngine;
use cc_common::oracle::ExtractionOracle;
use cc_common::rules::RulesConfig;
use cc_common::workflow::{EnhancementLoop, HumanAction, WorkflowStatus, MAX_ENHANCEMENT_ITERATIONS};
use cc_common::{CandidateProfile, JobRequirement, LocationType, SponsorshipPolicy};

/// Deterministic oracle for tests: fixed payloads, optional parse failures,
/// call counters.
#[derive(Default)]
struct ScriptedOracle {
    /// Resume texts containing this marker fail the parse call.
    fail_parse_marker: Option<String>,
    /// Per-candidate match payload override keyed by candidate name.
    match_payload: Option<String>,
    parse_confidence: Option<f64>,
    enhance_payload: Option<String>,
    qa_payload: Option<String>,
    analyze_calls: AtomicU32,
    enhance_calls: AtomicU32,
}

impl ScriptedOracle {
    fn match_scores(title: f64, skills: f64, experience: f64, profile: f64) -> String {
        format!(
            r#"{{"job_title_match_score": {title}, "skills_score": {skills},
                "experience_score": {experience}, "profile_description_match_score": {profile},
                "strengths": ["relevant stack"], "gaps": ["light on ops"],
                "reasoning": "scripted"}}"#
        )
    }
}

#[async_trait]
impl ExtractionOracle for ScriptedOracle {
    async fn analyze_job(&self, _job_text: &str) -> Result<String, ExtractionError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        Ok(r#"{"title": "Backend Engineer", "experience_years": 5,
               "location_type": "remote", "sponsorship_policy": "full_sponsorship"}"#
            .to_string())
    }

    async fn parse_candidate(&self, resume_text: &str) -> Result<String, ExtractionError> {
        if let Some(marker) = &self.fail_parse_marker {
            if resume_text.contains(marker.as_str()) {
                return Err(ExtractionError::Transport("connection reset".to_string()));
            }
        }
        let confidence = self.parse_confidence.unwrap_or(95.0);
        Ok(format!(
            r#"{{"name": "Parsed Candidate", "skills": ["Rust"], "experience_years": 5,
                "location_preference": "remote",
                "confidence": {{"overall": {confidence}, "needs_review": []}}}}"#
        ))
    }

    async fn score_match(
        &self,
        _candidate: &CandidateProfile,
        _job: &JobRequirement,
    ) -> Result<String, ExtractionError> {
        Ok(self
            .match_payload
            .clone()
            .unwrap_or_else(|| Self::match_scores(60.0, 60.0, 60.0, 60.0)))
    }

    async fn enhance_resume(
        &self,
        _candidate: &CandidateProfile,
        _job: &JobRequirement,
        _iteration: u32,
    ) -> Result<String, ExtractionError> {
        self.enhance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .enhance_payload
            .clone()
            .unwrap_or_else(|| r#"{"ats_score": {"before": 70, "after": 80}}"#.to_string()))
    }

    async fn review_quality(
        &self,
        _candidate: &CandidateProfile,
        _enhanced: &serde_json::Value,
    ) -> Result<String, ExtractionError> {
        Ok(self
            .qa_payload
            .clone()
            .unwrap_or_else(|| r#"{"approval": {"status": "approved"}, "issues": []}"#.to_string()))
    }
}

fn engine() -> RulesEngine {
    RulesEngine::new(Arc::new(RulesConfig::default()))
}

fn job() -> JobRequirement {
    JobRequirement {
        id: "job_1".to_string(),
        title: "Backend Engineer".to_string(),
        description: "We build storage engines in Rust.".to_string(),
        experience_years: 5.0,
        location_type: LocationType::Remote,
        ..JobRequirement::default()
    }
}

fn resume_candidates(count: usize) -> Vec<CandidateProfile> {
    (0..count)
        .map(|i| {
            let row = CandidateRow {
                name: format!("Candidate {}", i + 1),
                ..CandidateRow::default()
            };
            let mut candidate = candidate_from_row(i, &row);
            candidate.resume_text = Some(format!("resume body {}", i + 1));
            candidate
        })
        .collect()
}

#[tokio::test]
async fn one_failed_parse_never_aborts_the_batch() {
    let oracle = ScriptedOracle {
        fail_parse_marker: Some("resume body 3".to_string()),
        ..ScriptedOracle::default()
    };
    let orchestrator = BatchOrchestrator::new(engine()).with_max_concurrency(2);
    let report = orchestrator
        .run(job(), resume_candidates(5), &oracle, &CancelFlag::new())
        .await
        .expect("partial failure must not abort");

    assert_eq!(report.ranked.len(), 4);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].item, "cand_0003");
    assert_eq!(report.errors[0].stage, "parse");
    assert_eq!(report.total_candidates, 5);
}

#[tokio::test]
async fn the_job_is_analyzed_exactly_once_per_batch() {
    let oracle = ScriptedOracle::default();
    let orchestrator = BatchOrchestrator::new(engine());
    let report = orchestrator
        .run(job(), resume_candidates(5), &oracle, &CancelFlag::new())
        .await
        .expect("batch");
    assert_eq!(oracle.analyze_calls.load(Ordering::SeqCst), 1);
    assert!(report.job.analyzed.is_some());
}

#[tokio::test]
async fn an_already_analyzed_job_is_not_reanalyzed() {
    let oracle = ScriptedOracle::default();
    let mut structured = job();
    structured.analyzed = Some(serde_json::json!({"title": "Backend Engineer"}));
    BatchOrchestrator::new(engine())
        .run(structured, resume_candidates(2), &oracle, &CancelFlag::new())
        .await
        .expect("batch");
    assert_eq!(oracle.analyze_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tied_scores_rank_in_input_order_across_runs() {
    // identical payload for everyone, so every weighted score ties
    let oracle = ScriptedOracle::default();
    let orchestrator = BatchOrchestrator::new(engine()).with_max_concurrency(3);

    let mut previous: Option<Vec<String>> = None;
    for _ in 0..3 {
        let report = orchestrator
            .run(job(), resume_candidates(4), &oracle, &CancelFlag::new())
            .await
            .expect("batch");
        let order: Vec<String> = report.ranked.iter().map(|m| m.candidate_id.clone()).collect();
        assert_eq!(order, vec!["cand_0001", "cand_0002", "cand_0003", "cand_0004"]);
        assert_eq!(report.ranked[0].rank, Some(1));
        assert_eq!(report.ranked[3].rank, Some(4));
        if let Some(previous) = &previous {
            assert_eq!(&order, previous);
        }
        previous = Some(order);
    }
}

#[tokio::test]
async fn missing_job_description_is_a_validation_failure() {
    let oracle = ScriptedOracle::default();
    let mut empty = job();
    empty.description = String::new();
    let err = BatchOrchestrator::new(engine())
        .run(empty, resume_candidates(1), &oracle, &CancelFlag::new())
        .await;
    assert!(matches!(err, Err(BatchError::Validation(_))));
}

#[tokio::test]
async fn a_cancelled_run_surfaces_no_partial_results() {
    let oracle = ScriptedOracle::default();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = BatchOrchestrator::new(engine())
        .run(job(), resume_candidates(3), &oracle, &cancel)
        .await;
    assert!(matches!(err, Err(BatchError::Cancelled)));
}

#[tokio::test]
async fn excluded_candidates_keep_their_full_score() {
    let oracle = ScriptedOracle {
        match_payload: Some(ScriptedOracle::match_scores(90.0, 90.0, 90.0, 90.0)),
        ..ScriptedOracle::default()
    };
    let mut onsite_job = job();
    onsite_job.location_type = LocationType::Onsite;
    onsite_job.sponsorship_policy = SponsorshipPolicy::NoSponsorship;
    onsite_job.analyzed = Some(serde_json::json!({"title": "Backend Engineer"}));

    let row = CandidateRow {
        name: "Sam Ortiz".to_string(),
        location_preference: Some("Remote".to_string()),
        willing_to_relocate: Some("no".to_string()),
        work_authorization: Some("Requires Sponsorship".to_string()),
        exp_years: Some(5.0),
        ..CandidateRow::default()
    };
    let candidate = candidate_from_row(0, &row);

    let report = BatchOrchestrator::new(engine())
        .run(onsite_job, vec![candidate], &oracle, &CancelFlag::new())
        .await
        .expect("batch");

    let outcome = &report.ranked[0];
    assert!(outcome.excluded);
    // both gates fail; work authorization wins the reason
    assert_eq!(outcome.exclusion_reason, Some(ExclusionReason::WorkAuthorization));
    assert_eq!(outcome.weighted_score, 90.0);
    assert_eq!(outcome.potential_score, 90.0);
}

#[tokio::test]
async fn the_enhancement_loop_stops_at_the_iteration_bound() {
    // always "improving" from 70 to 80 keeps qualifying for a retry; the
    // bound must cut the loop anyway
    let oracle = ScriptedOracle::default();
    let workflow = EnhancementLoop::new(engine());
    let state = workflow
        .run("resume body", "job description", &oracle)
        .await
        .expect("workflow");

    assert_eq!(state.iterations, MAX_ENHANCEMENT_ITERATIONS);
    assert_eq!(oracle.enhance_calls.load(Ordering::SeqCst), MAX_ENHANCEMENT_ITERATIONS);
    assert_eq!(state.status, WorkflowStatus::Completed);
    assert!(state.final_recommendation.is_some());
}

#[tokio::test]
async fn strong_matches_skip_enhancement_entirely() {
    let oracle = ScriptedOracle {
        match_payload: Some(ScriptedOracle::match_scores(95.0, 95.0, 95.0, 95.0)),
        ..ScriptedOracle::default()
    };
    let state = EnhancementLoop::new(engine())
        .run("resume body", "job description", &oracle)
        .await
        .expect("workflow");
    assert_eq!(state.iterations, 0);
    assert_eq!(oracle.enhance_calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn weak_matches_are_rejected_before_enhancement() {
    let oracle = ScriptedOracle {
        match_payload: Some(ScriptedOracle::match_scores(20.0, 20.0, 20.0, 20.0)),
        ..ScriptedOracle::default()
    };
    let state = EnhancementLoop::new(engine())
        .run("resume body", "job description", &oracle)
        .await
        .expect("workflow");
    assert_eq!(state.status, WorkflowStatus::Rejected);
    assert_eq!(oracle.enhance_calls.load(Ordering::SeqCst), 0);
    let text = state.final_recommendation.expect("recommendation");
    assert!(text.starts_with("NOT RECOMMENDED"), "{text}");
}

#[tokio::test]
async fn low_parse_confidence_pauses_for_a_human() {
    let oracle = ScriptedOracle {
        parse_confidence: Some(40.0),
        ..ScriptedOracle::default()
    };
    let workflow = EnhancementLoop::new(engine());
    let state = workflow
        .run("resume body", "job description", &oracle)
        .await
        .expect("workflow");
    assert_eq!(state.status, WorkflowStatus::HumanReview);

    let approved = workflow
        .resume_with_human_action(state, HumanAction::Approve, &oracle)
        .await
        .expect("resume");
    assert_eq!(approved.status, WorkflowStatus::Completed);
    assert_eq!(approved.human_action, Some(HumanAction::Approve));
}

#[tokio::test]
async fn qa_needs_review_routes_to_a_human_and_revision_loops_back() {
    let oracle = ScriptedOracle {
        qa_payload: Some(r#"{"approval": {"status": "needs_review"}}"#.to_string()),
        // plateaued enhancement: one pass, no retries
        enhance_payload: Some(r#"{"ats_score": {"before": 79, "after": 80}}"#.to_string()),
        ..ScriptedOracle::default()
    };
    let workflow = EnhancementLoop::new(engine());
    let state = workflow
        .run("resume body", "job description", &oracle)
        .await
        .expect("workflow");
    assert_eq!(state.status, WorkflowStatus::HumanReview);
    assert_eq!(state.iterations, 1);

    let revised = workflow
        .resume_with_human_action(state, HumanAction::Revise, &oracle)
        .await
        .expect("resume");
    // one more enhancement pass, then QA pauses for a human again
    assert_eq!(revised.iterations, 2);
    assert_eq!(revised.status, WorkflowStatus::HumanReview);

    let rejected = workflow
        .resume_with_human_action(revised, HumanAction::Reject, &oracle)
        .await
        .expect("resume");
    assert_eq!(rejected.status, WorkflowStatus::Rejected);
}

#[tokio::test]
async fn a_failed_oracle_stage_preserves_accumulated_state() {
    struct FailingAnalyzer(ScriptedOracle);

    #[async_trait]
    impl ExtractionOracle for FailingAnalyzer {
        async fn analyze_job(&self, _job_text: &str) -> Result<String, ExtractionError> {
            Err(ExtractionError::Timeout { seconds: 30 })
        }
        async fn parse_candidate(&self, resume_text: &str) -> Result<String, ExtractionError> {
            self.0.parse_candidate(resume_text).await
        }
        async fn score_match(
            &self,
            candidate: &CandidateProfile,
            job: &JobRequirement,
        ) -> Result<String, ExtractionError> {
            self.0.score_match(candidate, job).await
        }
        async fn enhance_resume(
            &self,
            candidate: &CandidateProfile,
            job: &JobRequirement,
            iteration: u32,
        ) -> Result<String, ExtractionError> {
            self.0.enhance_resume(candidate, job, iteration).await
        }
        async fn review_quality(
            &self,
            candidate: &CandidateProfile,
            enhanced: &serde_json::Value,
        ) -> Result<String, ExtractionError> {
            self.0.review_quality(candidate, enhanced).await
        }
    }

    let oracle = FailingAnalyzer(ScriptedOracle::default());
    let state = EnhancementLoop::new(engine())
        .run("resume body", "job description", &oracle)
        .await
        .expect("workflow returns the failed state");

    assert_eq!(state.status, WorkflowStatus::Failed);
    // parse-stage results survive the failure
    assert!(state.parsed_resume.is_some());
    assert!(state.confidence_scores.contains_key("parser"));
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.errors[0].stage, "job_analyzer");
}
