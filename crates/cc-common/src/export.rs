//! Flat export records for downstream writers (spreadsheets, JSON dumps).
//! The core hands over plain data; file formats are the collaborator's job.

use serde::{Deserialize, Serialize};

use crate::batch::BatchReport;
use crate::matching::gates::ExclusionReason;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedExportRow {
    pub rank: usize,
    pub candidate_id: String,
    pub name: String,
    pub score: f64,
    /// What the candidate would score absent deal breakers, so a sheet can
    /// show "would have scored X".
    pub potential_score: f64,
    pub level: String,
    pub recommendation: String,
    pub excluded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusion_reason: Option<ExclusionReason>,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
}

/// Flattens a batch report into export rows, in rank order.
pub fn export_rows(report: &BatchReport) -> Vec<RankedExportRow> {
    report
        .ranked
        .iter()
        .map(|outcome| RankedExportRow {
            rank: outcome.rank.unwrap_or(0),
            candidate_id: outcome.candidate_id.clone(),
            name: outcome.candidate_name.clone(),
            score: outcome.weighted_score,
            potential_score: outcome.potential_score,
            level: outcome.level.clone(),
            recommendation: outcome.recommendation.clone(),
            excluded: outcome.excluded,
            exclusion_reason: outcome.exclusion_reason,
            strengths: outcome.strengths.clone(),
            gaps: outcome.gaps.iter().map(|g| g.text.clone()).collect(),
        })
        .collect()
}
