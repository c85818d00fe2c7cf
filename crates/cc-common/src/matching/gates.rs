//! Deal-breaker gates, run before any oracle call.
//!
//! Gates never mutate scores: they only produce exclusion metadata. Work
//! authorization is evaluated first, so when both gates fail the exclusion
//! reason reports the authorization conflict and the location failure stays
//! visible in the report.

use serde::{Deserialize, Serialize};

use crate::matching::location::{score_location_compatibility, LocationScore};
use crate::matching::work_auth::{check_work_authorization, WorkAuthCheck};
use crate::rules::RulesConfig;
use crate::{CandidateProfile, JobRequirement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    WorkAuthorization,
    LocationMismatch,
}

#[derive(Debug, Clone)]
pub struct GateReport {
    pub work_auth: WorkAuthCheck,
    pub location: LocationScore,
    pub exclusion: Option<ExclusionReason>,
}

impl GateReport {
    pub fn excluded(&self) -> bool {
        self.exclusion.is_some()
    }
}

pub fn run_deal_breakers(
    rules: &RulesConfig,
    candidate: &CandidateProfile,
    job: &JobRequirement,
) -> GateReport {
    let work_auth = check_work_authorization(
        candidate.work_authorization.as_deref(),
        job.sponsorship_policy,
    );
    let location = score_location_compatibility(
        &rules.location_rules,
        job.location_type,
        candidate.location_preference,
        candidate.willing_to_relocate,
    );

    let exclusion = if !work_auth.passes {
        Some(ExclusionReason::WorkAuthorization)
    } else if !location.passes {
        Some(ExclusionReason::LocationMismatch)
    } else {
        None
    };

    GateReport {
        work_auth,
        location,
        exclusion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LocationType, SponsorshipPolicy};

    fn candidate() -> CandidateProfile {
        CandidateProfile {
            id: "cand_0001".to_string(),
            name: "Alex Kim".to_string(),
            location_preference: LocationType::Remote,
            ..CandidateProfile::default()
        }
    }

    fn job() -> JobRequirement {
        JobRequirement {
            id: "job_1".to_string(),
            title: "Backend Engineer".to_string(),
            location_type: LocationType::Onsite,
            sponsorship_policy: SponsorshipPolicy::NoSponsorship,
            ..JobRequirement::default()
        }
    }

    #[test]
    fn compatible_pair_has_no_exclusion() {
        let rules = RulesConfig::default();
        let mut c = candidate();
        c.location_preference = LocationType::Onsite;
        let report = run_deal_breakers(&rules, &c, &job());
        assert!(report.exclusion.is_none());
        assert!(!report.excluded());
    }

    #[test]
    fn location_only_failure_reports_location_mismatch() {
        let rules = RulesConfig::default();
        let report = run_deal_breakers(&rules, &candidate(), &job());
        assert_eq!(report.exclusion, Some(ExclusionReason::LocationMismatch));
        assert!(report.work_auth.passes);
    }

    #[test]
    fn work_authorization_takes_priority_when_both_gates_fail() {
        let rules = RulesConfig::default();
        let mut c = candidate();
        c.work_authorization = Some("Requires Sponsorship".to_string());
        let report = run_deal_breakers(&rules, &c, &job());
        assert_eq!(report.exclusion, Some(ExclusionReason::WorkAuthorization));
        // the location failure stays visible alongside
        assert!(!report.location.passes);
    }

    #[test]
    fn relocation_willingness_clears_the_location_gate() {
        let rules = RulesConfig::default();
        let mut c = candidate();
        c.willing_to_relocate = true;
        let report = run_deal_breakers(&rules, &c, &job());
        assert!(report.exclusion.is_none());
    }
}
