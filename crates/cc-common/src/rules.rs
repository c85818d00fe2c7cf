//! The versioned rules document: serde model, file loading with a hardcoded
//! fallback, and load-time consistency validation.
//!
//! Loaded once at startup and shared read-only (`Arc`) across concurrent
//! matching tasks. Never mutated mid-run; hot reload means building a fresh
//! config between runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::matching::weights::{self, FALLBACK_WEIGHTS, WEIGHT_SUM_TOLERANCE};

/// One cell of the location compatibility matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRule {
    pub job_location: String,
    pub candidate_preference: String,
    pub score: i32,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocationRule {
    pub enabled: bool,
    pub score_boost: i32,
}

impl Default for RelocationRule {
    fn default() -> Self {
        RelocationRule { enabled: true, score_boost: 20 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationRules {
    #[serde(default)]
    pub compatibility_matrix: Vec<LocationRule>,
    #[serde(default)]
    pub relocation: RelocationRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceBand {
    pub adjustment: i32,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceRules {
    pub underqualified: ExperienceBand,
    pub slightly_underqualified: ExperienceBand,
    pub meets_requirement: ExperienceBand,
    pub exceeds_requirement: ExperienceBand,
    pub overqualified: ExperienceBand,
}

impl Default for ExperienceRules {
    fn default() -> Self {
        let band = |adjustment: i32, reasoning: &str| ExperienceBand {
            adjustment,
            reasoning: reasoning.to_string(),
        };
        ExperienceRules {
            underqualified: band(-20, "Significantly below the required experience"),
            slightly_underqualified: band(-10, "Slightly below the required experience"),
            meets_requirement: band(0, "Meets the experience requirement"),
            exceeds_requirement: band(10, "Exceeds the requirement by a comfortable margin"),
            overqualified: band(-5, "Well above the requirement; retention risk"),
        }
    }
}

/// Inclusive score band mapped to a recommendation tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min_score: i32,
    pub max_score: i32,
    pub recommendation: String,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoRejectCondition {
    LocationIncompatible,
    InsufficientSkills,
    SeniorExperienceGap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRejectRule {
    pub condition: AutoRejectCondition,
    pub threshold: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRejectRules {
    pub enabled: bool,
    /// Evaluated in order; the first matching rule wins.
    pub rules: Vec<AutoRejectRule>,
}

impl Default for AutoRejectRules {
    fn default() -> Self {
        let rule = |condition, threshold: f64, reasoning: &str| AutoRejectRule {
            condition,
            threshold,
            reasoning: reasoning.to_string(),
        };
        AutoRejectRules {
            enabled: true,
            rules: vec![
                rule(
                    AutoRejectCondition::LocationIncompatible,
                    30.0,
                    "Location incompatible and candidate is unwilling to relocate",
                ),
                rule(
                    AutoRejectCondition::InsufficientSkills,
                    40.0,
                    "Skills match below the minimum bar",
                ),
                rule(
                    AutoRejectCondition::SeniorExperienceGap,
                    -3.0,
                    "Experience gap too large for a senior role",
                ),
            ],
        }
    }
}

/// Required/preferred split used when callers break skills scoring down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsRules {
    pub required_weight: f64,
    pub preferred_weight: f64,
    pub minimum_required_match: f64,
}

impl Default for SkillsRules {
    fn default() -> Self {
        SkillsRules {
            required_weight: 0.75,
            preferred_weight: 0.25,
            minimum_required_match: 0.3,
        }
    }
}

/// The whole rules document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_version")]
    pub version: String,
    pub matching_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub location_rules: LocationRules,
    #[serde(default)]
    pub experience_rules: ExperienceRules,
    pub scoring_thresholds: BTreeMap<String, ScoreBand>,
    #[serde(default)]
    pub auto_reject: AutoRejectRules,
    #[serde(default)]
    pub skills_rules: SkillsRules,
}

fn default_version() -> String {
    "unversioned".to_string()
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig {
            version: "builtin-1".to_string(),
            matching_weights: weights::weight_map(weights::CANONICAL_WEIGHTS),
            location_rules: LocationRules {
                compatibility_matrix: default_location_matrix(),
                relocation: RelocationRule::default(),
            },
            experience_rules: ExperienceRules::default(),
            scoring_thresholds: default_thresholds(),
            auto_reject: AutoRejectRules::default(),
            skills_rules: SkillsRules::default(),
        }
    }
}

fn default_location_matrix() -> Vec<LocationRule> {
    let rule = |job: &str, pref: &str, score: i32, reasoning: &str| LocationRule {
        job_location: job.to_string(),
        candidate_preference: pref.to_string(),
        score,
        reasoning: reasoning.to_string(),
    };
    vec![
        rule("Remote", "Remote", 100, "Perfect match: remote job, remote preference"),
        rule("Remote", "Hybrid", 90, "Remote job accommodates a hybrid preference"),
        rule("Remote", "Onsite", 85, "Remote job; candidate prefers an office but can adapt"),
        rule("Remote", "Flexible", 100, "Remote job, candidate is flexible"),
        rule("Hybrid", "Remote", 40, "Hybrid job requires office days the candidate wants to avoid"),
        rule("Hybrid", "Hybrid", 100, "Perfect match: hybrid job, hybrid preference"),
        rule("Hybrid", "Onsite", 90, "Hybrid job suits an office-leaning candidate"),
        rule("Hybrid", "Flexible", 100, "Hybrid job, candidate is flexible"),
        rule("Onsite", "Remote", 20, "Onsite job conflicts with a remote preference"),
        rule("Onsite", "Hybrid", 60, "Onsite job; candidate wants partial remote"),
        rule("Onsite", "Onsite", 100, "Perfect match: onsite job, onsite preference"),
        rule("Onsite", "Flexible", 90, "Onsite job, candidate is flexible"),
        rule("Flexible", "Remote", 100, "Flexible job fits any preference"),
        rule("Flexible", "Hybrid", 100, "Flexible job fits any preference"),
        rule("Flexible", "Onsite", 100, "Flexible job fits any preference"),
        rule("Flexible", "Flexible", 100, "Flexible job fits any preference"),
    ]
}

fn default_thresholds() -> BTreeMap<String, ScoreBand> {
    let band = |min: i32, max: i32, recommendation: &str, action: &str| ScoreBand {
        min_score: min,
        max_score: max,
        recommendation: recommendation.to_string(),
        action: action.to_string(),
    };
    BTreeMap::from([
        ("excellent".to_string(), band(85, 100, "STRONG HIRE", "Fast-track to interview")),
        ("strong".to_string(), band(75, 84, "RECOMMENDED", "Schedule an interview")),
        ("good".to_string(), band(65, 74, "CONSIDER", "Review gaps before interviewing")),
        ("moderate".to_string(), band(50, 64, "WEAK MATCH", "Consider only if the pool is thin")),
        ("poor".to_string(), band(0, 49, "NOT RECOMMENDED", "Do not proceed")),
    ])
}

impl RulesConfig {
    /// Loads and validates a rules file. Read and parse failures are errors;
    /// use [`RulesConfig::load_or_default`] for the tolerant startup path.
    pub fn load(path: &Path) -> Result<RulesConfig, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: RulesConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.ensure_valid()?;
        info!(version = %config.version, path = %path.display(), "loaded rules config");
        Ok(config)
    }

    /// Startup loader: a missing or unreadable file falls back to the
    /// builtin default with the minimal 6-factor weight set, but a file that
    /// parses and then fails validation is still fatal.
    pub fn load_or_default(path: &Path) -> Result<RulesConfig, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "rules file unreadable; using builtin fallback weights");
                return Ok(RulesConfig::fallback());
            }
        };
        let config: RulesConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.ensure_valid()?;
        info!(version = %config.version, path = %path.display(), "loaded rules config");
        Ok(config)
    }

    /// The builtin default with the 6-factor fallback weight set swapped in.
    pub fn fallback() -> RulesConfig {
        RulesConfig {
            version: "builtin-fallback".to_string(),
            matching_weights: weights::weight_map(FALLBACK_WEIGHTS),
            ..RulesConfig::default()
        }
    }

    /// Consistency checks, run once at load. Returns every problem found so
    /// a bad file can be fixed in one pass.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let sum = weights::weight_sum(&self.matching_weights);
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            problems.push(format!("matching weights sum to {sum:.3}, expected 1.0"));
        }
        for (name, weight) in &self.matching_weights {
            if !(0.0..=1.0).contains(weight) {
                problems.push(format!("weight {name} = {weight} is outside [0, 1]"));
            }
        }

        let mut bands: Vec<(&String, &ScoreBand)> = self.scoring_thresholds.iter().collect();
        bands.sort_by_key(|(_, band)| band.min_score);
        for (name, band) in &bands {
            if band.min_score > band.max_score {
                problems.push(format!(
                    "threshold {name} has min {} above max {}",
                    band.min_score, band.max_score
                ));
            }
        }
        for window in bands.windows(2) {
            let (lo_name, lo) = window[0];
            let (hi_name, hi) = window[1];
            if lo.max_score >= hi.min_score {
                problems.push(format!(
                    "thresholds {lo_name} [{}, {}] and {hi_name} [{}, {}] overlap",
                    lo.min_score, lo.max_score, hi.min_score, hi.max_score
                ));
            }
        }

        for rule in &self.location_rules.compatibility_matrix {
            if !(0..=100).contains(&rule.score) {
                problems.push(format!(
                    "location rule ({}, {}) score {} is outside [0, 100]",
                    rule.job_location, rule.candidate_preference, rule.score
                ));
            }
        }

        problems
    }

    fn ensure_valid(&self) -> Result<(), ConfigError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RulesConfig::default().validate().is_empty());
        assert!(RulesConfig::fallback().validate().is_empty());
    }

    #[test]
    fn default_matrix_covers_every_pair() {
        let config = RulesConfig::default();
        let types = ["Remote", "Hybrid", "Onsite", "Flexible"];
        for job in types {
            for pref in types {
                assert!(
                    config.location_rules.compatibility_matrix.iter().any(|r| {
                        r.job_location == job && r.candidate_preference == pref
                    }),
                    "missing matrix entry for ({job}, {pref})"
                );
            }
        }
    }

    #[test]
    fn validate_reports_weight_sum_drift() {
        let mut config = RulesConfig::default();
        config.matching_weights.insert("skills".to_string(), 0.9);
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("sum to")));
    }

    #[test]
    fn validate_reports_overlapping_thresholds() {
        let mut config = RulesConfig::default();
        if let Some(band) = config.scoring_thresholds.get_mut("strong") {
            band.min_score = 60;
            band.max_score = 90;
        }
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("overlap")), "{problems:?}");
    }

    #[test]
    fn missing_file_falls_back_to_six_factor_weights() {
        let config = RulesConfig::load_or_default(Path::new("/nonexistent/rules.json"))
            .expect("fallback never fails");
        assert_eq!(config.version, "builtin-fallback");
        assert!(config.matching_weights.contains_key("culture_fit"));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn strict_load_rejects_a_missing_file() {
        let err = RulesConfig::load(Path::new("/nonexistent/rules.json"));
        assert!(matches!(err, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn garbled_file_is_a_parse_error_even_on_the_tolerant_path() {
        let path = std::env::temp_dir().join("cc_rules_garbled_test.json");
        std::fs::write(&path, "{not json").expect("temp write");
        let err = RulesConfig::load_or_default(&path);
        assert!(matches!(err, Err(ConfigError::Parse { .. })));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = RulesConfig::default();
        let raw = serde_json::to_string(&config).expect("serialize");
        let back: RulesConfig = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(back.version, config.version);
        assert_eq!(back.matching_weights, config.matching_weights);
        assert!(back.validate().is_empty());
    }
}
