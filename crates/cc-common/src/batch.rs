//! Batch matching: analyze the job once, parse and match candidates over a
//! bounded worker pool, rank.
//!
//! A linear stage machine, not a DAG. Each stage is a pure function of its
//! inputs plus the oracle, so any stage is safe to retry with the same
//! inputs. Per-candidate failures accumulate alongside results; only missing
//! required input or cancellation aborts a run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{StateError, ValidationError};
use crate::matching::pipeline::{MatchOutcome, MatchingPipeline};
use crate::matching::scoring::RulesEngine;
use crate::oracle::{decode_best_effort, BestEffort, ExtractionOracle};
use crate::{CandidateProfile, JobRequirement};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Stages of a batch run, strictly forward-moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStage {
    Started,
    JobAnalyzed,
    CandidatesParsed,
    Matched,
    Ranked,
    Completed,
    Failed,
}

impl BatchStage {
    pub fn name(&self) -> &'static str {
        match self {
            BatchStage::Started => "started",
            BatchStage::JobAnalyzed => "job_analyzed",
            BatchStage::CandidatesParsed => "candidates_parsed",
            BatchStage::Matched => "matched",
            BatchStage::Ranked => "ranked",
            BatchStage::Completed => "completed",
            BatchStage::Failed => "failed",
        }
    }

    /// Moves to `next`, rejecting backward or out-of-terminal transitions.
    pub fn advance(&mut self, next: BatchStage) -> Result<(), StateError> {
        let valid = match next {
            BatchStage::Failed => *self != BatchStage::Completed,
            _ => next > *self && *self != BatchStage::Failed,
        };
        if !valid {
            return Err(StateError::InvalidTransition {
                from: self.name(),
                to: next.name(),
            });
        }
        *self = next;
        Ok(())
    }
}

/// Cooperative cancellation handle, checked between candidate tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A recoverable per-item failure recorded alongside results.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemError {
    /// Candidate id, or `"job"` for the job-analysis stage.
    pub item: String,
    pub stage: &'static str,
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("batch run cancelled")]
    Cancelled,
}

/// What every batch run produces: the (possibly partial) ranked list plus
/// the full error list. Callers decide whether partial success is enough.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub stage: BatchStage,
    pub job: JobRequirement,
    pub ranked: Vec<MatchOutcome>,
    pub errors: Vec<BatchItemError>,
    pub total_candidates: usize,
}

pub struct BatchOrchestrator {
    pipeline: MatchingPipeline,
    max_concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(engine: RulesEngine) -> BatchOrchestrator {
        BatchOrchestrator {
            pipeline: MatchingPipeline::new(engine),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> BatchOrchestrator {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Runs one batch: job analysis strictly precedes every candidate task,
    /// candidates then fan out over at most `max_concurrency` concurrent
    /// parse+match tasks.
    pub async fn run(
        &self,
        job: JobRequirement,
        candidates: Vec<CandidateProfile>,
        oracle: &dyn ExtractionOracle,
        cancel: &CancelFlag,
    ) -> Result<BatchReport, BatchError> {
        let mut stage = BatchStage::Started;
        let mut errors: Vec<BatchItemError> = Vec::new();
        let total_candidates = candidates.len();

        if job.description.trim().is_empty() && job.analyzed.is_none() {
            return Err(ValidationError::MissingInput("job description").into());
        }

        // analyze once, reuse for every candidate; never re-analyze an
        // already structured job
        let mut job = job;
        if job.analyzed.is_none() {
            match oracle.analyze_job(&job.description).await {
                Ok(raw) => match decode_best_effort::<serde_json::Value>(&raw) {
                    BestEffort::Parsed(analyzed) => {
                        job = JobRequirement::from_analyzed(&job.id, &job.description, &analyzed);
                    }
                    BestEffort::Unparsed { reason, .. } => {
                        warn!(job = job.id.as_str(), reason = reason.as_str(), "job analysis did not decode; matching against row fields only");
                        errors.push(BatchItemError {
                            item: "job".to_string(),
                            stage: "job_analysis",
                            detail: reason,
                        });
                    }
                },
                Err(err) => {
                    warn!(job = job.id.as_str(), error = %err, "job analysis failed; matching against row fields only");
                    errors.push(BatchItemError {
                        item: "job".to_string(),
                        stage: "job_analysis",
                        detail: err.to_string(),
                    });
                }
            }
        }
        stage.advance(BatchStage::JobAnalyzed)?;
        info!(job = job.id.as_str(), candidates = total_candidates, "job analyzed; starting candidate fan-out");

        if cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }

        // parse + match per candidate; results collected per task and merged
        // afterwards, so no shared mutable error list
        let pipeline = &self.pipeline;
        let job_ref = &job;
        let mut results: Vec<(usize, Result<MatchOutcome, BatchItemError>)> =
            stream::iter(candidates.into_iter().enumerate())
                .map(|(index, candidate)| async move {
                    if cancel.is_cancelled() {
                        let skipped = BatchItemError {
                            item: candidate.id.clone(),
                            stage: "cancelled",
                            detail: "run cancelled before this candidate was dispatched".to_string(),
                        };
                        return (index, Err(skipped));
                    }
                    match prepare_candidate(candidate, oracle).await {
                        Ok(prepared) => {
                            let outcome = pipeline.match_one(&prepared, job_ref, oracle).await;
                            (index, Ok(outcome))
                        }
                        Err(err) => (index, Err(err)),
                    }
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;
        stage.advance(BatchStage::CandidatesParsed)?;
        stage.advance(BatchStage::Matched)?;

        if cancel.is_cancelled() {
            // in-flight work above was allowed to finish; its results are
            // discarded so a cancelled run never surfaces partial output
            return Err(BatchError::Cancelled);
        }

        // restore input order before ranking so ties break by input order
        results.sort_by_key(|(index, _)| *index);
        let mut ranked = Vec::new();
        for (_, result) in results {
            match result {
                Ok(outcome) => ranked.push(outcome),
                Err(err) => errors.push(err),
            }
        }
        ranked.sort_by(|a, b| {
            b.weighted_score
                .partial_cmp(&a.weighted_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (position, outcome) in ranked.iter_mut().enumerate() {
            outcome.rank = Some(position + 1);
        }
        stage.advance(BatchStage::Ranked)?;
        stage.advance(BatchStage::Completed)?;

        info!(
            job = job.id.as_str(),
            ranked = ranked.len(),
            errors = errors.len(),
            "batch completed"
        );
        Ok(BatchReport {
            stage,
            job,
            ranked,
            errors,
            total_candidates,
        })
    }
}

/// Runs the parse stage for one candidate. Already-structured candidates
/// pass through untouched; a failed or undecodable parse drops the
/// candidate from the matched set.
async fn prepare_candidate(
    candidate: CandidateProfile,
    oracle: &dyn ExtractionOracle,
) -> Result<CandidateProfile, BatchItemError> {
    if candidate.parsed_resume.is_some() {
        return Ok(candidate);
    }
    let Some(resume_text) = candidate.resume_text.clone() else {
        // plain row candidate, nothing to parse
        return Ok(candidate);
    };

    let raw = oracle
        .parse_candidate(&resume_text)
        .await
        .map_err(|err| BatchItemError {
            item: candidate.id.clone(),
            stage: "parse",
            detail: err.to_string(),
        })?;

    match decode_best_effort::<serde_json::Value>(&raw) {
        BestEffort::Parsed(parsed) => {
            let mut enriched = CandidateProfile::from_parsed(&candidate.id, &parsed);
            // parse output wins, but row identity survives a sparse parse
            if enriched.name == "Unknown Candidate" && !candidate.name.is_empty() {
                enriched.name = candidate.name;
            }
            enriched.resume_text = Some(resume_text);
            Ok(enriched)
        }
        BestEffort::Unparsed { reason, .. } => Err(BatchItemError {
            item: candidate.id,
            stage: "parse",
            detail: format!("resume parse did not decode: {reason}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_only_advance_forward() {
        let mut stage = BatchStage::Started;
        assert!(stage.advance(BatchStage::JobAnalyzed).is_ok());
        assert!(stage.advance(BatchStage::Matched).is_ok());
        let err = stage.advance(BatchStage::JobAnalyzed);
        assert!(matches!(err, Err(StateError::InvalidTransition { .. })));
    }

    #[test]
    fn failed_is_reachable_from_any_live_stage_but_absorbing() {
        let mut stage = BatchStage::CandidatesParsed;
        assert!(stage.advance(BatchStage::Failed).is_ok());
        assert!(stage.advance(BatchStage::Ranked).is_err());

        let mut done = BatchStage::Completed;
        assert!(done.advance(BatchStage::Failed).is_err());
    }

    #[test]
    fn cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
