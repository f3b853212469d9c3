use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::backend::VerificationBackend;
use super::parse::parse_reply;
use super::pricing::Pricing;
use super::retry::RetryConfig;
use super::types::{ServiceRequest, VerificationContext, VerificationOutcome};
use crate::governor::Cost;
use crate::render::PageImage;

/// Instruction sent when no custom text is configured.
pub const DEFAULT_INSTRUCTION: &str = "You are comparing two scanned documents. \
Decide whether they are the same underlying document, ignoring differences in scan \
quality, filename and redactions. Answer in exactly this format:\n\
VERDICT: MATCH or NO MATCH\n\
CONFIDENCE: an integer from 0 to 100\n\
REASONING: one short paragraph";

/// Verifies pairs through a [`VerificationBackend`] with retries, parsing and pricing.
pub struct VerificationClient<B: VerificationBackend> {
    backend: Arc<B>,
    pricing: Pricing,
    retry: RetryConfig,
    instruction: Arc<str>,
}

impl<B: VerificationBackend> std::fmt::Debug for VerificationClient<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationClient")
            .field("pricing", &self.pricing)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<B: VerificationBackend> VerificationClient<B> {
    pub fn new(backend: Arc<B>, pricing: Pricing, retry: RetryConfig) -> Self {
        Self {
            backend,
            pricing,
            retry,
            instruction: Arc::from(DEFAULT_INSTRUCTION),
        }
    }

    pub fn with_instruction(mut self, instruction: &str) -> Self {
        self.instruction = Arc::from(instruction);
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    /// Request for one pair: instruction, context, then both sides' pages.
    pub fn request(
        &self,
        left: Arc<Vec<PageImage>>,
        right: Arc<Vec<PageImage>>,
        context: &VerificationContext,
    ) -> ServiceRequest {
        ServiceRequest {
            instruction: Arc::clone(&self.instruction),
            context: context.describe(),
            left,
            right,
        }
    }

    /// Worst-case cost of sending `request`.
    pub fn cost_bound(&self, request: &ServiceRequest) -> Cost {
        self.pricing.cost(&self.backend.usage_bound(request))
    }

    /// Verifies one pair. Never fails: exhausted retries yield an `error` verdict at
    /// zero cost.
    #[instrument(skip_all, fields(left = %context.left_id, right = %context.right_id))]
    pub async fn verify(
        &self,
        left: Arc<Vec<PageImage>>,
        right: Arc<Vec<PageImage>>,
        context: &VerificationContext,
    ) -> VerificationOutcome {
        let request = self.request(left, right, context);
        self.send(&request).await
    }

    /// Sends a prepared request with retries, then parses and prices the reply.
    #[instrument(skip_all)]
    pub async fn send(&self, request: &ServiceRequest) -> VerificationOutcome {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.backend.send(request).await {
                Ok(response) => {
                    let parsed = parse_reply(&response.text);
                    let cost = self.pricing.cost(&response.usage);
                    if parsed.needs_review {
                        warn!(
                            reply_len = response.text.len(),
                            "Unparseable verification reply, flagged for review"
                        );
                    }
                    debug!(
                        verdict = %parsed.verdict,
                        confidence = parsed.confidence,
                        cost = %cost,
                        attempts,
                        "Pair verified"
                    );
                    return VerificationOutcome {
                        verdict: parsed.verdict,
                        confidence: parsed.confidence,
                        reasoning: parsed.reasoning,
                        needs_review: parsed.needs_review,
                        cost,
                        usage: response.usage,
                        attempts,
                    };
                }
                Err(e) if e.is_retryable() && attempts <= self.retry.max_retries => {
                    let backoff = self.retry.delay_for(attempts);
                    let delay = e.retry_after().map_or(backoff, |hint| hint.max(backoff));
                    warn!(
                        error = %e,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Verification call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(error = %e, attempts, "Verification failed");
                    return VerificationOutcome::failed(e.to_string(), attempts);
                }
            }
        }
    }
}
