//! Work-authorization deal breaker.
//!
//! Authorization is free text off resumes and intake forms, so the check is
//! a case-insensitive marker scan. Unknown ("Not Specified" or absent) is
//! permissive: incomplete data must never reject a candidate on its own.

use crate::SponsorshipPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkAuthCheck {
    pub passes: bool,
    pub reasoning: String,
}

const SPONSORSHIP_MARKERS: &[&str] = &[
    "requires sponsorship",
    "require sponsorship",
    "needs sponsorship",
    "need sponsorship",
    "sponsorship required",
    "visa required",
    "requires visa",
    "h1b",
    "h-1b",
];

/// Whether the free-text authorization indicates the candidate needs a visa
/// sponsor.
pub fn indicates_sponsorship_need(auth: &str) -> bool {
    let lowered = auth.to_ascii_lowercase();
    SPONSORSHIP_MARKERS.iter().any(|marker| lowered.contains(marker))
}

pub fn check_work_authorization(
    candidate_auth: Option<&str>,
    policy: SponsorshipPolicy,
) -> WorkAuthCheck {
    let auth = candidate_auth
        .map(str::trim)
        .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("not specified"));

    let Some(auth) = auth else {
        return WorkAuthCheck {
            passes: true,
            reasoning: "Work authorization not specified; treated as non-blocking".to_string(),
        };
    };

    match policy {
        SponsorshipPolicy::NoSponsorship if indicates_sponsorship_need(auth) => WorkAuthCheck {
            passes: false,
            reasoning: format!(
                "Job offers no sponsorship but candidate authorization indicates sponsorship is needed ({auth})"
            ),
        },
        SponsorshipPolicy::NoSponsorship => WorkAuthCheck {
            passes: true,
            reasoning: format!("No sponsorship offered; candidate authorization acceptable ({auth})"),
        },
        SponsorshipPolicy::FullSponsorship | SponsorshipPolicy::CaseByCase => WorkAuthCheck {
            passes: true,
            reasoning: "Job sponsors or evaluates sponsorship case by case".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SponsorshipPolicy::*;

    #[test]
    fn unspecified_authorization_passes() {
        assert!(check_work_authorization(None, NoSponsorship).passes);
        assert!(check_work_authorization(Some("Not Specified"), NoSponsorship).passes);
        assert!(check_work_authorization(Some("  "), NoSponsorship).passes);
    }

    #[test]
    fn sponsorship_need_fails_a_no_sponsorship_job() {
        let check = check_work_authorization(Some("Requires Sponsorship"), NoSponsorship);
        assert!(!check.passes);
        assert!(check.reasoning.contains("Requires Sponsorship"));

        assert!(!check_work_authorization(Some("H1B transfer needed"), NoSponsorship).passes);
        assert!(!check_work_authorization(Some("visa required"), NoSponsorship).passes);
    }

    #[test]
    fn authorized_candidate_passes_a_no_sponsorship_job() {
        assert!(check_work_authorization(Some("US Citizen"), NoSponsorship).passes);
        assert!(check_work_authorization(Some("Green Card"), NoSponsorship).passes);
    }

    #[test]
    fn sponsoring_jobs_pass_everyone() {
        assert!(check_work_authorization(Some("Requires Sponsorship"), FullSponsorship).passes);
        assert!(check_work_authorization(Some("Requires Sponsorship"), CaseByCase).passes);
    }
}
