//! Location compatibility: matrix lookup, relocation bonus, deal-breaker
//! floor.

use tracing::warn;

use crate::rules::LocationRules;
use crate::LocationType;

/// Base scores below this fail the gate unless the candidate will relocate.
pub const LOCATION_PASS_FLOOR: i32 = 30;

/// The relocation bonus only applies when the base score is below this.
pub const RELOCATION_BONUS_CEILING: i32 = 70;

#[derive(Debug, Clone, PartialEq)]
pub struct LocationScore {
    pub score: i32,
    pub reasoning: String,
    pub passes: bool,
}

/// Looks up the (job, preference) pair in the compatibility matrix.
///
/// A missing entry fails open: neutral 50, passes. Willingness to relocate
/// boosts low base scores (capped at 100) and always clears the gate; the
/// gate itself is judged on the pre-bonus score.
pub fn score_location_compatibility(
    rules: &LocationRules,
    job: LocationType,
    preference: LocationType,
    willing_to_relocate: bool,
) -> LocationScore {
    let entry = rules.compatibility_matrix.iter().find(|r| {
        r.job_location.eq_ignore_ascii_case(job.as_str())
            && r.candidate_preference.eq_ignore_ascii_case(preference.as_str())
    });

    let Some(entry) = entry else {
        warn!(
            job = job.as_str(),
            preference = preference.as_str(),
            "no location rule for pair; using neutral default"
        );
        return LocationScore {
            score: 50,
            reasoning: "No specific rule found - using default score".to_string(),
            passes: true,
        };
    };

    let base = entry.score;
    let mut score = base;
    let mut reasoning = entry.reasoning.clone();

    if willing_to_relocate && rules.relocation.enabled && base < RELOCATION_BONUS_CEILING {
        let boost = rules.relocation.score_boost;
        score = (base + boost).min(100);
        reasoning.push_str(&format!(" (+{boost} for willingness to relocate)"));
    }

    LocationScore {
        score,
        reasoning,
        passes: base >= LOCATION_PASS_FLOOR || willing_to_relocate,
    }
}
