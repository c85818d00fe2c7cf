//! The rules engine: pure, deterministic scoring functions over a shared
//! read-only [`RulesConfig`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::matching::experience::{score_experience_gap, ExperienceAdjustment};
use crate::matching::location::{score_location_compatibility, LocationScore};
use crate::matching::work_auth::{check_work_authorization, WorkAuthCheck};
use crate::rules::{AutoRejectCondition, RulesConfig};
use crate::{LocationType, SponsorshipPolicy};

/// Open mapping of component name to a score in [0, 100]. `BTreeMap` keeps
/// iteration in canonical key order, which the aggregation contract needs.
pub type ComponentScores = BTreeMap<String, f64>;

/// Tier produced by threshold classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub level: String,
    pub recommendation: String,
    pub action: String,
}

/// Inputs the auto-reject filter looks at. Gathered by the pipeline from the
/// gate report and component scores.
#[derive(Debug, Clone, Copy)]
pub struct AutoRejectInput {
    pub location_score: f64,
    pub skills_match_pct: f64,
    pub experience_gap_years: f64,
    pub willing_to_relocate: bool,
    pub is_senior_role: bool,
}

#[derive(Debug, Clone)]
pub struct RulesEngine {
    config: Arc<RulesConfig>,
}

impl RulesEngine {
    pub fn new(config: Arc<RulesConfig>) -> RulesEngine {
        RulesEngine { config }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    /// The active weight scheme. Callers must not assume a fixed key set.
    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.config.matching_weights
    }

    pub fn score_location(
        &self,
        job: LocationType,
        preference: LocationType,
        willing_to_relocate: bool,
    ) -> LocationScore {
        score_location_compatibility(&self.config.location_rules, job, preference, willing_to_relocate)
    }

    pub fn score_experience_gap(
        &self,
        candidate_years: f64,
        required_years: f64,
    ) -> ExperienceAdjustment {
        score_experience_gap(&self.config.experience_rules, candidate_years, required_years)
    }

    pub fn check_work_authorization(
        &self,
        candidate_auth: Option<&str>,
        policy: SponsorshipPolicy,
    ) -> WorkAuthCheck {
        check_work_authorization(candidate_auth, policy)
    }

    /// Weighted sum over the components that have a configured weight,
    /// rounded to one decimal.
    ///
    /// Iterates the weight map, not the score map, so summation order is
    /// fixed by canonical key order and the result is bit-identical across
    /// runs. Score keys with no weight are logged and ignored.
    pub fn aggregate_weighted_score(&self, scores: &ComponentScores) -> f64 {
        let weights = self.weights();
        let mut total = 0.0;
        for (component, weight) in weights {
            if let Some(score) = scores.get(component) {
                total += score * weight;
            }
        }
        for component in scores.keys() {
            if !weights.contains_key(component) {
                warn!(component = component.as_str(), "component score has no configured weight; ignored");
            }
        }
        (total * 10.0).round() / 10.0
    }

    /// Finds the band whose inclusive [min, max] range contains the score.
    ///
    /// Non-overlap is a load-time invariant, so at most one band matches. A
    /// gap in the config yields a review-required fallback rather than an
    /// error: classification must always produce something.
    pub fn classify_recommendation(&self, overall_score: f64) -> Recommendation {
        for (level, band) in &self.config.scoring_thresholds {
            if overall_score >= f64::from(band.min_score) && overall_score <= f64::from(band.max_score) {
                return Recommendation {
                    level: level.clone(),
                    recommendation: band.recommendation.clone(),
                    action: band.action.clone(),
                };
            }
        }
        warn!(score = overall_score, "no scoring threshold matched; using fallback tier");
        Recommendation {
            level: "unknown".to_string(),
            recommendation: "REVIEW REQUIRED".to_string(),
            action: "Manual review needed".to_string(),
        }
    }

    /// Advisory auto-reject filter: the first matching condition wins.
    ///
    /// Advisory means the candidate keeps its score and stays retrievable;
    /// the reason only flags it out of the default ranked view.
    pub fn should_auto_reject(&self, input: AutoRejectInput) -> Option<String> {
        let filter = &self.config.auto_reject;
        if !filter.enabled {
            return None;
        }
        for rule in &filter.rules {
            let fired = match rule.condition {
                AutoRejectCondition::LocationIncompatible => {
                    input.location_score < rule.threshold && !input.willing_to_relocate
                }
                AutoRejectCondition::InsufficientSkills => input.skills_match_pct < rule.threshold,
                AutoRejectCondition::SeniorExperienceGap => {
                    input.experience_gap_years < rule.threshold && input.is_senior_role
                }
            };
            if fired {
                return Some(rule.reasoning.clone());
            }
        }
        None
    }
}
