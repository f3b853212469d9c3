use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{PairRecord, VerificationRecord};
use crate::governor::Cost;
use crate::index::DocumentRef;
use crate::verify::{Verdict, VerificationOutcome};

/// Identity of a pair across runs: `(left reference id, right reference id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub left: String,
    pub right: String,
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.left, self.right)
    }
}

/// A (restricted, reference) pair under consideration.
///
/// Stages only narrow and annotate pairs; they never create new ones.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePair {
    pub left: Arc<DocumentRef>,
    pub right: Arc<DocumentRef>,
    pub page_delta: u32,
    /// Set by Stage 2.
    pub text_similarity: Option<f64>,
    pub verdict: Verdict,
    /// 0–100; meaningful for `match` and `no_match`.
    pub confidence: u8,
    /// Justification from the service, or why the pair is `error` / `pending`.
    pub reasoning: Option<String>,
    pub needs_review: bool,
    pub cost: Cost,
}

impl CandidatePair {
    pub fn new(left: Arc<DocumentRef>, right: Arc<DocumentRef>, page_delta: u32) -> Self {
        Self {
            left,
            right,
            page_delta,
            text_similarity: None,
            verdict: Verdict::Pending,
            confidence: 0,
            reasoning: None,
            needs_review: false,
            cost: Cost::ZERO,
        }
    }

    pub fn key(&self) -> PairKey {
        PairKey {
            left: self.left.reference_id.clone(),
            right: self.right.reference_id.clone(),
        }
    }

    pub fn to_record(&self) -> PairRecord {
        PairRecord {
            left: self.left.reference_id.clone(),
            right: self.right.reference_id.clone(),
            page_delta: self.page_delta,
            text_similarity: self.text_similarity,
        }
    }

    pub fn apply_outcome(&mut self, outcome: &VerificationOutcome) {
        self.verdict = outcome.verdict;
        self.confidence = outcome.confidence;
        self.reasoning = Some(outcome.reasoning.clone());
        self.needs_review = outcome.needs_review;
        self.cost = outcome.cost;
    }

    /// Restores the result of an earlier run.
    pub fn apply_record(&mut self, record: &VerificationRecord) {
        self.verdict = record.verdict;
        self.confidence = record.confidence;
        self.reasoning = Some(record.reasoning.clone());
        self.needs_review = record.needs_review;
        self.cost = record.cost;
    }

    pub fn to_verification_record(&self, outcome: &VerificationOutcome) -> VerificationRecord {
        VerificationRecord {
            left: self.left.reference_id.clone(),
            right: self.right.reference_id.clone(),
            verdict: outcome.verdict,
            confidence: outcome.confidence,
            reasoning: outcome.reasoning.clone(),
            needs_review: outcome.needs_review,
            cost: outcome.cost,
            usage: outcome.usage,
        }
    }

    /// Marks the pair as not verified, with a reason.
    pub fn leave_pending(&mut self, reason: &str) {
        self.verdict = Verdict::Pending;
        self.reasoning = Some(reason.to_string());
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every Stage 3 candidate was processed.
    Completed,
    BudgetExhausted,
    Cancelled,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::BudgetExhausted => "budget_exhausted",
            RunOutcome::Cancelled => "cancelled",
        }
    }

    /// Reason attached to pairs left `pending`.
    pub fn pending_reason(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "not verified",
            RunOutcome::BudgetExhausted => "budget cap reached before verification",
            RunOutcome::Cancelled => "run cancelled before verification",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
