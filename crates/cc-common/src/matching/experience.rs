//! Experience-gap banding.
//!
//! Exceeding the requirement by a little is rewarded, by a lot penalized:
//! large overshoot is a retention-risk signal, not a strength.

use crate::rules::{ExperienceBand, ExperienceRules};

#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceAdjustment {
    pub adjustment: i32,
    pub reasoning: String,
}

/// Bands the gap `candidate_years - required_years`. Evaluated in priority
/// order; the first matching band wins, so gap == 5 lands in overqualified
/// rather than exceeds-requirement.
pub fn score_experience_gap(
    rules: &ExperienceRules,
    candidate_years: f64,
    required_years: f64,
) -> ExperienceAdjustment {
    let gap = candidate_years - required_years;
    let band = if gap <= -2.0 {
        &rules.underqualified
    } else if (gap + 1.0).abs() < 1e-9 {
        // exactly one year short; fractional gaps in (-2, 0) fall through to
        // meets-requirement
        &rules.slightly_underqualified
    } else if gap >= 5.0 {
        &rules.overqualified
    } else if gap >= 2.0 {
        &rules.exceeds_requirement
    } else {
        &rules.meets_requirement
    };
    from_band(band)
}

fn from_band(band: &ExperienceBand) -> ExperienceAdjustment {
    ExperienceAdjustment {
        adjustment: band.adjustment,
        reasoning: band.reasoning.clone(),
    }
}
