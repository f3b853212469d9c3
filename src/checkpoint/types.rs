//! On-disk run state.
//!
//! Each section carries its own `version` so sections can evolve independently. Every
//! struct is `#[serde(default)]`: missing fields load as empty or zero, unknown fields
//! are ignored.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::CHECKPOINT_FORMAT_VERSION;
use crate::governor::Cost;
use crate::index::FactsRecord;
use crate::verify::{Usage, Verdict};

pub const FACTS_SECTION_VERSION: u32 = 1;
pub const SURVIVORS_SECTION_VERSION: u32 = 1;
pub const LEDGER_SECTION_VERSION: u32 = 1;
pub const TIMINGS_SECTION_VERSION: u32 = 1;

/// A candidate pair as persisted: documents by reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PairRecord {
    pub left: String,
    pub right: String,
    pub page_delta: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_similarity: Option<f64>,
}

/// Result of one verified pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VerificationRecord {
    pub left: String,
    pub right: String,
    pub verdict: Verdict,
    pub confidence: u8,
    pub reasoning: String,
    pub needs_review: bool,
    pub cost: Cost,
    #[serde(flatten)]
    pub usage: Usage,
}

impl VerificationRecord {
    pub fn key(&self) -> (&str, &str) {
        (&self.left, &self.right)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentFactsCache {
    pub version: u32,
    pub entries: Vec<FactsRecord>,
}

impl Default for DocumentFactsCache {
    fn default() -> Self {
        Self {
            version: FACTS_SECTION_VERSION,
            entries: Vec::new(),
        }
    }
}

/// Survivor lists. `None` means the stage has not completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSurvivors {
    pub version: u32,
    pub stage1: Option<Vec<PairRecord>>,
    pub stage2: Option<Vec<PairRecord>>,
}

impl Default for StageSurvivors {
    fn default() -> Self {
        Self {
            version: SURVIVORS_SECTION_VERSION,
            stage1: None,
            stage2: None,
        }
    }
}

type ResultIndex = HashMap<String, HashMap<String, usize>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostLedger {
    pub version: u32,
    pub cumulative_cost: Cost,
    /// Service calls made, retries included.
    pub calls_made: u64,
    pub matches: u64,
    pub non_matches: u64,
    pub errors: u64,
    /// Latest result per pair.
    pub results: Vec<VerificationRecord>,
    /// Position in `results` by left then right id. Rebuilt by [`CostLedger::reindex`].
    #[serde(skip)]
    index: ResultIndex,
    #[serde(skip)]
    indexed: usize,
}

impl Default for CostLedger {
    fn default() -> Self {
        Self {
            version: LEDGER_SECTION_VERSION,
            cumulative_cost: Cost::ZERO,
            calls_made: 0,
            matches: 0,
            non_matches: 0,
            errors: 0,
            results: Vec::new(),
            index: HashMap::new(),
            indexed: 0,
        }
    }
}

impl PartialEq for CostLedger {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.cumulative_cost == other.cumulative_cost
            && self.calls_made == other.calls_made
            && self.matches == other.matches
            && self.non_matches == other.non_matches
            && self.errors == other.errors
            && self.results == other.results
    }
}

impl CostLedger {
    /// Rebuilds the pair index and verdict counters from `results`. Later entries for the
    /// same pair win.
    pub fn reindex(&mut self) {
        self.index.clear();
        for (i, record) in self.results.iter().enumerate() {
            self.index
                .entry(record.left.clone())
                .or_default()
                .insert(record.right.clone(), i);
        }
        self.indexed = self.results.len();

        self.matches = 0;
        self.non_matches = 0;
        self.errors = 0;
        let latest: Vec<Verdict> = self
            .index
            .values()
            .flat_map(HashMap::values)
            .map(|&i| self.results[i].verdict)
            .collect();
        for verdict in latest {
            self.tally(verdict, true);
        }
    }

    fn tally(&mut self, verdict: Verdict, add: bool) {
        let counter = match verdict {
            Verdict::Match => &mut self.matches,
            Verdict::NoMatch => &mut self.non_matches,
            Verdict::Error => &mut self.errors,
            Verdict::Pending => return,
        };
        *counter = if add {
            counter.saturating_add(1)
        } else {
            counter.saturating_sub(1)
        };
    }

    fn position(&self, left: &str, right: &str) -> Option<usize> {
        self.index.get(left)?.get(right).copied()
    }

    /// Adds a result, replacing an earlier one for the same pair.
    pub fn record(&mut self, record: VerificationRecord, calls: u32) {
        if self.indexed != self.results.len() {
            self.reindex();
        }
        self.cumulative_cost += record.cost;
        self.calls_made += u64::from(calls);
        self.tally(record.verdict, true);

        match self.position(&record.left, &record.right) {
            Some(i) => {
                let previous = std::mem::replace(&mut self.results[i], record);
                self.tally(previous.verdict, false);
            }
            None => {
                self.index
                    .entry(record.left.clone())
                    .or_default()
                    .insert(record.right.clone(), self.results.len());
                self.results.push(record);
                self.indexed = self.results.len();
            }
        }
    }

    pub fn get(&self, left: &str, right: &str) -> Option<&VerificationRecord> {
        if self.indexed != self.results.len() {
            return self.results.iter().rev().find(|r| r.key() == (left, right));
        }
        self.position(left, right).map(|i| &self.results[i])
    }
}

/// Wall time per stage in milliseconds, accumulated across resumed runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimings {
    pub version: u32,
    pub extraction_ms: u64,
    pub stage1_ms: u64,
    pub stage2_ms: u64,
    pub stage3_ms: u64,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self {
            version: TIMINGS_SECTION_VERSION,
            extraction_ms: 0,
            stage1_ms: 0,
            stage2_ms: 0,
            stage3_ms: 0,
        }
    }
}

/// Which timing bucket to add to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    Extraction,
    Stage1,
    Stage2,
    Stage3,
}

impl StageTimings {
    pub fn add(&mut self, phase: StagePhase, elapsed: Duration) {
        let ms = elapsed.as_millis().min(u128::from(u64::MAX)) as u64;
        let slot = match phase {
            StagePhase::Extraction => &mut self.extraction_ms,
            StagePhase::Stage1 => &mut self.stage1_ms,
            StagePhase::Stage2 => &mut self.stage2_ms,
            StagePhase::Stage3 => &mut self.stage3_ms,
        };
        *slot = slot.saturating_add(ms);
    }
}

/// Everything needed to resume a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunState {
    pub format_version: u32,
    pub run_id: String,
    /// RFC 3339 time of the last save.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    pub facts: DocumentFactsCache,
    pub survivors: StageSurvivors,
    pub ledger: CostLedger,
    pub timings: StageTimings,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            run_id: uuid::Uuid::new_v4().to_string(),
            saved_at: None,
            facts: DocumentFactsCache::default(),
            survivors: StageSurvivors::default(),
            ledger: CostLedger::default(),
            timings: StageTimings::default(),
        }
    }
}
