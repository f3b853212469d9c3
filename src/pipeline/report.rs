//! Run summary and the final pair report.

use serde::{Deserialize, Serialize};

use super::types::{CandidatePair, RunOutcome};
use crate::checkpoint::StageTimings;
use crate::constants::{HIGH_CONFIDENCE_MIN, MEDIUM_CONFIDENCE_MIN, REPORTING_CURRENCY};
use crate::governor::Cost;
use crate::index::IndexStats;
use crate::verify::Verdict;

/// Counts and totals for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub outcome: RunOutcome,
    /// `true` if the run started from an existing checkpoint.
    pub resumed: bool,
    pub index: IndexStats,
    pub stage1_candidates: usize,
    pub stage2_candidates: usize,
    pub matches: usize,
    pub non_matches: usize,
    pub errors: usize,
    pub pending: usize,
    pub needs_review: usize,
    /// Spend across this run and every run it resumed.
    pub total_cost: Cost,
    pub calls_made: u64,
    pub checkpoint_failures: u64,
    pub timings: StageTimings,
}

impl RunSummary {
    /// Fills the verdict counters from the final pair list.
    pub fn count_verdicts(&mut self, pairs: &[CandidatePair]) {
        self.matches = 0;
        self.non_matches = 0;
        self.errors = 0;
        self.pending = 0;
        self.needs_review = 0;

        for pair in pairs {
            match pair.verdict {
                Verdict::Match => self.matches += 1,
                Verdict::NoMatch => self.non_matches += 1,
                Verdict::Error => self.errors += 1,
                Verdict::Pending => self.pending += 1,
            }
            if pair.needs_review {
                self.needs_review += 1;
            }
        }
    }
}

/// One line of the exported report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub left: String,
    pub right: String,
    pub left_path: String,
    pub right_path: String,
    pub page_delta: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_similarity: Option<f64>,
    pub verdict: Verdict,
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub needs_review: bool,
    pub cost: Cost,
}

impl From<&CandidatePair> for ReportRow {
    fn from(pair: &CandidatePair) -> Self {
        Self {
            left: pair.left.reference_id.clone(),
            right: pair.right.reference_id.clone(),
            left_path: pair.left.path.to_string_lossy().into_owned(),
            right_path: pair.right.path.to_string_lossy().into_owned(),
            page_delta: pair.page_delta,
            text_similarity: pair.text_similarity,
            verdict: pair.verdict,
            confidence: pair.confidence,
            reasoning: pair.reasoning.clone(),
            needs_review: pair.needs_review,
            cost: pair.cost,
        }
    }
}

/// Confidence grouping of the final pairs.
///
/// Decided pairs (`match` and `no_match`) are banded by confidence; `pending` and
/// `error` pairs are listed as unresolved.
#[derive(Debug, Default)]
pub struct ConfidenceBands<'a> {
    pub high: Vec<&'a CandidatePair>,
    pub medium: Vec<&'a CandidatePair>,
    pub low: Vec<&'a CandidatePair>,
    pub unresolved: Vec<&'a CandidatePair>,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    /// Unit of every `cost` field, in micros.
    currency: &'static str,
    summary: &'a RunSummary,
    pairs: Vec<ReportRow>,
}

/// Final pair sequence plus the run summary.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Stage 3 order: highest similarity first.
    pub pairs: Vec<CandidatePair>,
    pub summary: RunSummary,
}

impl PipelineReport {
    pub fn outcome(&self) -> RunOutcome {
        self.summary.outcome
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        self.pairs.iter().map(ReportRow::from).collect()
    }

    pub fn matches(&self) -> impl Iterator<Item = &CandidatePair> {
        self.pairs.iter().filter(|p| p.verdict == Verdict::Match)
    }

    pub fn bands(&self) -> ConfidenceBands<'_> {
        let mut bands = ConfidenceBands::default();
        for pair in &self.pairs {
            if !pair.verdict.is_final() {
                bands.unresolved.push(pair);
            } else if pair.confidence >= HIGH_CONFIDENCE_MIN {
                bands.high.push(pair);
            } else if pair.confidence >= MEDIUM_CONFIDENCE_MIN {
                bands.medium.push(pair);
            } else {
                bands.low.push(pair);
            }
        }
        bands
    }

    /// Pretty JSON with the summary and every row.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ReportDocument {
            currency: REPORTING_CURRENCY,
            summary: &self.summary,
            pairs: self.rows(),
        })
    }
}
