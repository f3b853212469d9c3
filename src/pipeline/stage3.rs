//! Stage 3: budgeted, rate-limited visual verification.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use super::cancel::CancelFlag;
use super::types::{CandidatePair, RunOutcome};
use crate::checkpoint::CheckpointManager;
use crate::governor::{BudgetGovernor, RateGovernor};
use crate::render::{PageRenderer, RenderService};
use crate::verify::{
    Verdict, VerificationBackend, VerificationClient, VerificationContext, VerificationOutcome,
};

/// Why a pair was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Budget,
    Cancelled,
}

enum Processed {
    Verified(VerificationOutcome),
    Skipped(Skip),
}

/// Counters for one Stage 3 pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stage3Stats {
    /// Pairs restored from an earlier run instead of being verified again.
    pub resumed: usize,
    /// Pairs sent for verification in this run (render failures included).
    pub attempted: usize,
    pub render_failures: usize,
}

/// Everything Stage 3 needs, borrowed from the pipeline.
pub struct Stage3<'a, R: PageRenderer, B: VerificationBackend> {
    pub render: &'a RenderService<R>,
    pub client: &'a VerificationClient<B>,
    pub budget: Arc<BudgetGovernor>,
    pub rate: &'a RateGovernor,
    pub checkpoint: &'a CheckpointManager,
    pub cancel: &'a CancelFlag,
    pub workers: usize,
    pub checkpoint_interval: usize,
}

impl<R: PageRenderer, B: VerificationBackend> Stage3<'_, R, B> {
    async fn process(&self, pair: &CandidatePair) -> Processed {
        if self.cancel.is_cancelled() {
            return Processed::Skipped(Skip::Cancelled);
        }
        if self.budget.is_exhausted() {
            return Processed::Skipped(Skip::Budget);
        }

        let rendered = match self
            .render
            .render_pair(&pair.left.path, &pair.right.path)
            .await
        {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(pair = %pair.key(), error = %e, "Render failed");
                return Processed::Verified(VerificationOutcome::failed(
                    format!("render failed: {e}"),
                    0,
                ));
            }
        };

        let context = VerificationContext {
            left_id: pair.left.reference_id.clone(),
            right_id: pair.right.reference_id.clone(),
            similarity: pair.text_similarity,
        };
        let request = self.client.request(rendered.left, rendered.right, &context);
        let bound = self.client.cost_bound(&request);

        let Some(permit) = self.budget.reserve(bound).await else {
            return Processed::Skipped(Skip::Budget);
        };
        if self.cancel.is_cancelled() {
            return Processed::Skipped(Skip::Cancelled);
        }

        self.rate.acquire().await;
        let outcome = self.client.send(&request).await;
        let total = permit.commit(outcome.cost);

        debug!(
            pair = %pair.key(),
            verdict = %outcome.verdict,
            confidence = outcome.confidence,
            cost = %outcome.cost,
            reserved = %bound,
            total = %total,
            "Pair processed"
        );
        Processed::Verified(outcome)
    }

    /// Verifies `pairs` in order until they run out, the budget is spent or the run is
    /// cancelled. Pairs with a final verdict from an earlier run are restored, not re-sent.
    #[instrument(skip_all, fields(pairs = pairs.len(), workers = self.workers))]
    pub async fn run(
        &self,
        mut pairs: Vec<CandidatePair>,
    ) -> (Vec<CandidatePair>, RunOutcome, Stage3Stats) {
        let mut stats = Stage3Stats::default();
        let mut todo = Vec::with_capacity(pairs.len());

        for (i, pair) in pairs.iter_mut().enumerate() {
            let key = pair.key();
            match self.checkpoint.verified(&key.left, &key.right) {
                Some(record) if record.verdict.is_final() => {
                    pair.apply_record(&record);
                    stats.resumed += 1;
                }
                _ => todo.push(i),
            }
        }

        if stats.resumed > 0 {
            info!(
                resumed = stats.resumed,
                remaining = todo.len(),
                "Restored earlier verdicts"
            );
        }

        let mut skipped: Option<Skip> = None;
        let mut since_checkpoint = 0usize;
        let interval = self.checkpoint_interval.max(1);

        {
            let snapshot = &pairs;
            let mut results = stream::iter(todo)
                .map(move |i| async move { (i, self.process(&snapshot[i]).await) })
                .buffer_unordered(self.workers.max(1));

            let mut applied = Vec::new();
            while let Some((i, processed)) = results.next().await {
                match processed {
                    Processed::Verified(outcome) => {
                        stats.attempted += 1;
                        if outcome.attempts == 0 {
                            stats.render_failures += 1;
                        }
                        let record = snapshot[i].to_verification_record(&outcome);
                        self.checkpoint.record_verification(record, outcome.attempts);
                        applied.push((i, outcome));

                        since_checkpoint += 1;
                        if since_checkpoint >= interval {
                            self.checkpoint.save_or_warn();
                            since_checkpoint = 0;
                        }
                    }
                    Processed::Skipped(reason) => {
                        // Budget exhaustion wins over cancellation when both happen.
                        if skipped != Some(Skip::Budget) {
                            skipped = Some(reason);
                        }
                    }
                }
            }
            drop(results);

            for (i, outcome) in applied {
                pairs[i].apply_outcome(&outcome);
            }
        }

        let outcome = match skipped {
            Some(Skip::Budget) => RunOutcome::BudgetExhausted,
            Some(Skip::Cancelled) => RunOutcome::Cancelled,
            None => RunOutcome::Completed,
        };

        for pair in pairs.iter_mut().filter(|p| p.verdict == Verdict::Pending) {
            pair.leave_pending(outcome.pending_reason());
        }

        info!(
            outcome = %outcome,
            attempted = stats.attempted,
            resumed = stats.resumed,
            spent = %self.budget.spent(),
            "Stage 3 complete"
        );
        (pairs, outcome, stats)
    }
}
