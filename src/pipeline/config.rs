use std::time::Duration;

use crate::constants::{
    DEFAULT_BUDGET_CAP, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_EXTRACT_WORKERS,
    DEFAULT_MIN_CALL_DELAY_MS, DEFAULT_PAGE_TOLERANCE, DEFAULT_SIMILARITY_THRESHOLD,
    DEFAULT_TEXT_PAGES, DEFAULT_VERIFY_WORKERS,
};
use crate::governor::Cost;

/// Stage parameters and resource limits for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Stage 1: maximum `|Δpages|`.
    pub page_tolerance: u32,
    /// Stage 2: minimum similarity (inclusive).
    pub similarity_threshold: f64,
    /// Leading pages whose text is extracted.
    pub text_pages: u32,
    /// Stage 3 pairs between checkpoints.
    pub checkpoint_interval: usize,
    pub verify_workers: usize,
    pub extract_workers: usize,
    pub budget_cap: Cost,
    pub min_call_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_tolerance: DEFAULT_PAGE_TOLERANCE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            text_pages: DEFAULT_TEXT_PAGES,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            verify_workers: DEFAULT_VERIFY_WORKERS,
            extract_workers: DEFAULT_EXTRACT_WORKERS,
            budget_cap: Cost::from_amount(DEFAULT_BUDGET_CAP),
            min_call_delay: Duration::from_millis(DEFAULT_MIN_CALL_DELAY_MS),
        }
    }
}
