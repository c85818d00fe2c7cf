//! Named weight schemes.
//!
//! Weights are an open mapping rather than a fixed struct so a scheme change
//! never touches the aggregation code. The shipped scheme is the 4-factor
//! split returned by the match-scoring oracle; the 6-factor split survives
//! only as the hardcoded fallback used when no rules file can be read.

use std::collections::BTreeMap;

/// Canonical 4-factor scheme: what the match-scoring oracle reports.
pub const CANONICAL_WEIGHTS: &[(&str, f64)] = &[
    ("experience", 0.20),
    ("job_title_match", 0.35),
    ("profile_description_match", 0.15),
    ("skills", 0.30),
];

/// Minimal 6-factor fallback applied when the rules file is missing or
/// unreadable.
pub const FALLBACK_WEIGHTS: &[(&str, f64)] = &[
    ("culture_fit", 0.07),
    ("education", 0.10),
    ("experience", 0.25),
    ("location", 0.20),
    ("skills", 0.30),
    ("soft_skills", 0.08),
];

/// Tolerance on the weights-sum-to-one invariant.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Materializes a constant scheme as the open map the engine consumes.
/// `BTreeMap` gives a canonical key order, which keeps summation stable.
pub fn weight_map(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(name, weight)| (name.to_string(), *weight))
        .collect()
}

/// Sum in canonical key order.
pub fn weight_sum(weights: &BTreeMap<String, f64>) -> f64 {
    weights.values().sum()
}
