//! End-to-end orchestration of one run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use super::cancel::CancelFlag;
use super::config::PipelineConfig;
use super::error::{PipelineError, PipelineResult};
use super::report::{PipelineReport, RunSummary};
use super::stage1::{PagedDocument, structural_filter};
use super::stage2::content_filter;
use super::stage3::Stage3;
use super::types::CandidatePair;
use crate::checkpoint::{CheckpointManager, PairRecord, StagePhase};
use crate::governor::{BudgetGovernor, RateGovernor};
use crate::index::{
    CollectionSpec, DocumentFacts, DocumentIndex, DocumentRef, Enumeration, FactsExtractor,
    FactsStore, IndexStats, enumerate,
};
use crate::render::{PageRenderer, RenderService};
use crate::verify::{VerificationBackend, VerificationClient};

/// The cascade: index → structural filter → content filter → verification.
///
/// Every stage's survivors are written to the checkpoint as soon as the stage finishes,
/// so an interrupted run picks up at the first stage without a survivor list.
pub struct Pipeline<E, S, R, B>
where
    E: FactsExtractor,
    S: FactsStore,
    R: PageRenderer,
    B: VerificationBackend,
{
    config: PipelineConfig,
    restricted: CollectionSpec,
    reference: CollectionSpec,
    index: DocumentIndex<E, S>,
    render: RenderService<R>,
    client: VerificationClient<B>,
    checkpoint: Arc<CheckpointManager>,
    rate: RateGovernor,
    cancel: CancelFlag,
}

impl<E, S, R, B> std::fmt::Debug for Pipeline<E, S, R, B>
where
    E: FactsExtractor,
    S: FactsStore,
    R: PageRenderer,
    B: VerificationBackend,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("restricted", &self.restricted.root)
            .field("reference", &self.reference.root)
            .field("checkpoint", &self.checkpoint.path())
            .finish_non_exhaustive()
    }
}

/// Documents of both collections with their facts.
struct Indexed {
    left: Vec<Arc<DocumentRef>>,
    right: Vec<Arc<DocumentRef>>,
    facts: Arc<HashMap<PathBuf, DocumentFacts>>,
    stats: IndexStats,
}

impl Indexed {
    fn paged(&self, docs: &[Arc<DocumentRef>]) -> Vec<PagedDocument> {
        docs.iter()
            .map(|doc| {
                let pages = self
                    .facts
                    .get(&doc.path)
                    .filter(|f| f.is_usable())
                    .map_or(0, |f| f.page_count);
                (Arc::clone(doc), pages)
            })
            .collect()
    }
}

impl<E, S, R, B> Pipeline<E, S, R, B>
where
    E: FactsExtractor,
    S: FactsStore,
    R: PageRenderer,
    B: VerificationBackend,
{
    pub fn new(
        config: PipelineConfig,
        restricted: CollectionSpec,
        reference: CollectionSpec,
        index: DocumentIndex<E, S>,
        render: RenderService<R>,
        client: VerificationClient<B>,
        checkpoint: Arc<CheckpointManager>,
    ) -> Self {
        let rate = RateGovernor::new(config.min_call_delay);
        Self {
            config,
            restricted,
            reference,
            index,
            render,
            client,
            checkpoint,
            rate,
            cancel: CancelFlag::new(),
        }
    }

    /// Uses an externally owned flag, e.g. one wired to a signal handler.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn checkpoint(&self) -> &Arc<CheckpointManager> {
        &self.checkpoint
    }

    pub fn index(&self) -> &DocumentIndex<E, S> {
        &self.index
    }

    /// Runs every stage and returns the final report.
    ///
    /// Budget exhaustion and cancellation end the run normally with pairs left
    /// `pending`. Only enumeration and checkpoint loading errors abort.
    #[instrument(skip_all, fields(run_id = %self.checkpoint.run_id()))]
    pub async fn run(&self) -> PipelineResult<PipelineReport> {
        let indexed = self.build_index().await?;

        let started = Instant::now();
        let stage1 = self.stage1(&indexed);
        self.checkpoint.add_timing(StagePhase::Stage1, started.elapsed());
        let stage1_candidates = stage1.len();

        let started = Instant::now();
        let stage2 = self.stage2(&indexed, stage1).await?;
        self.checkpoint.add_timing(StagePhase::Stage2, started.elapsed());
        let stage2_candidates = stage2.len();

        let started = Instant::now();
        let budget =
            BudgetGovernor::new(self.config.budget_cap, self.checkpoint.cumulative_cost());
        let stage3 = Stage3 {
            render: &self.render,
            client: &self.client,
            budget,
            rate: &self.rate,
            checkpoint: self.checkpoint.as_ref(),
            cancel: &self.cancel,
            workers: self.config.verify_workers,
            checkpoint_interval: self.config.checkpoint_interval,
        };
        let (pairs, outcome, _) = stage3.run(stage2).await;
        self.checkpoint.add_timing(StagePhase::Stage3, started.elapsed());
        self.checkpoint.save_or_warn();

        let state = self.checkpoint.snapshot();
        let mut summary = RunSummary {
            run_id: state.run_id,
            outcome,
            resumed: self.checkpoint.resumed(),
            index: indexed.stats,
            stage1_candidates,
            stage2_candidates,
            matches: 0,
            non_matches: 0,
            errors: 0,
            pending: 0,
            needs_review: 0,
            total_cost: state.ledger.cumulative_cost,
            calls_made: state.ledger.calls_made,
            checkpoint_failures: self.checkpoint.failures(),
            timings: state.timings,
        };
        summary.count_verdicts(&pairs);

        info!(
            outcome = %summary.outcome,
            stage1 = summary.stage1_candidates,
            stage2 = summary.stage2_candidates,
            matches = summary.matches,
            non_matches = summary.non_matches,
            errors = summary.errors,
            pending = summary.pending,
            cost = %summary.total_cost,
            "Run finished"
        );

        Ok(PipelineReport { pairs, summary })
    }

    async fn build_index(&self) -> PipelineResult<Indexed> {
        let started = Instant::now();

        let specs = (self.restricted.clone(), self.reference.clone());
        let (left, right): (Enumeration, Enumeration) =
            tokio::task::spawn_blocking(move || -> PipelineResult<_> {
                Ok((enumerate(&specs.0)?, enumerate(&specs.1)?))
            })
            .await
            .map_err(|e| PipelineError::Task {
                reason: format!("enumeration task failed: {e}"),
            })??;

        let mut stats = IndexStats {
            restricted_documents: left.len(),
            reference_documents: right.len(),
            duplicates: left.duplicates.len() + right.duplicates.len(),
            skipped_files: left.skipped + right.skipped,
            ..IndexStats::default()
        };

        let cached = self.checkpoint.facts();
        if !cached.is_empty() {
            self.index.store().seed(cached);
        }

        let hits_before = self.index.hits();
        let misses_before = self.index.misses();
        let workers = self.config.extract_workers;

        let mut facts = HashMap::with_capacity(left.len() + right.len());
        for docs in [&left.documents, &right.documents] {
            let extracted = self.index.facts_for_all(docs, workers).await;
            for (doc, doc_facts) in docs.iter().zip(extracted) {
                stats.observe(&doc_facts);
                facts.insert(doc.path.clone(), doc_facts);
            }
        }
        stats.cache_hits = self.index.hits() - hits_before;
        stats.cache_misses = self.index.misses() - misses_before;

        self.checkpoint.record_facts(self.index.store().records());
        self.checkpoint
            .add_timing(StagePhase::Extraction, started.elapsed());
        self.checkpoint.save_or_warn();

        info!(
            restricted = stats.restricted_documents,
            reference = stats.reference_documents,
            duplicates = stats.duplicates,
            skipped = stats.skipped_files,
            extraction_failures = stats.extraction_failures,
            cache_hits = stats.cache_hits,
            cache_misses = stats.cache_misses,
            "Index ready"
        );

        Ok(Indexed {
            left: left.documents,
            right: right.documents,
            facts: Arc::new(facts),
            stats,
        })
    }

    fn stage1(&self, indexed: &Indexed) -> Vec<CandidatePair> {
        if let Some(records) = self.checkpoint.stage1() {
            let pairs = restore(indexed, &records);
            info!(candidates = pairs.len(), "Stage 1 restored from checkpoint");
            return pairs;
        }

        let pairs = structural_filter(
            &indexed.paged(&indexed.left),
            &indexed.paged(&indexed.right),
            self.config.page_tolerance,
        );
        self.checkpoint
            .record_stage1(pairs.iter().map(CandidatePair::to_record).collect());
        self.checkpoint.save_or_warn();
        pairs
    }

    async fn stage2(
        &self,
        indexed: &Indexed,
        stage1: Vec<CandidatePair>,
    ) -> PipelineResult<Vec<CandidatePair>> {
        if let Some(records) = self.checkpoint.stage2() {
            let pairs = restore(indexed, &records);
            info!(candidates = pairs.len(), "Stage 2 restored from checkpoint");
            return Ok(pairs);
        }

        let facts = Arc::clone(&indexed.facts);
        let threshold = self.config.similarity_threshold;
        let pairs =
            tokio::task::spawn_blocking(move || content_filter(stage1, &facts, threshold))
                .await
                .map_err(|e| PipelineError::Task {
                    reason: format!("stage 2 task failed: {e}"),
                })?;

        self.checkpoint
            .record_stage2(pairs.iter().map(CandidatePair::to_record).collect());
        self.checkpoint.save_or_warn();
        Ok(pairs)
    }
}

/// Rebuilds pairs from a persisted survivor list, in list order.
///
/// Records whose documents are no longer in the collections are dropped.
fn restore(indexed: &Indexed, records: &[PairRecord]) -> Vec<CandidatePair> {
    let left: HashMap<&str, &Arc<DocumentRef>> = indexed
        .left
        .iter()
        .map(|d| (d.reference_id.as_str(), d))
        .collect();
    let right: HashMap<&str, &Arc<DocumentRef>> = indexed
        .right
        .iter()
        .map(|d| (d.reference_id.as_str(), d))
        .collect();

    records
        .iter()
        .filter_map(|record| {
            match (left.get(record.left.as_str()), right.get(record.right.as_str())) {
                (Some(l), Some(r)) => {
                    let mut pair =
                        CandidatePair::new(Arc::clone(l), Arc::clone(r), record.page_delta);
                    pair.text_similarity = record.text_similarity;
                    Some(pair)
                }
                _ => {
                    warn!(
                        left = %record.left,
                        right = %record.right,
                        "Checkpointed pair refers to a missing document, dropping"
                    );
                    None
                }
            }
        })
        .collect()
}
