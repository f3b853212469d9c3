//! Cross-cutting, shared constants.
//!
//! Tuning defaults (tolerance, threshold, blend weights) were chosen empirically on one
//! corpus. Treat them as starting points, override them through [`crate::Config`].

/// Stage 1: maximum allowed page-count difference.
pub const DEFAULT_PAGE_TOLERANCE: u32 = 1;

/// Stage 2: minimum text similarity for a pair to survive.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.60;

/// Leading pages whose text feeds the similarity scorer.
pub const DEFAULT_TEXT_PAGES: u32 = 1;

/// Leading pages rendered for visual verification.
pub const DEFAULT_RENDER_PAGES: u32 = 3;

/// Documents with fewer extracted words than this are classified as scanned.
pub const SCANNED_WORD_THRESHOLD: usize = 20;

/// Weight of the weighted-overlap measure in the blended similarity score.
pub const OVERLAP_WEIGHT: f64 = 0.4;
/// Weight of the cosine measure in the blended similarity score.
pub const COSINE_WEIGHT: f64 = 0.6;

/// Verified pairs between periodic checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

/// Default minimum spacing between verification calls.
pub const DEFAULT_MIN_CALL_DELAY_MS: u64 = 1_000;

/// Default budget cap in the reporting currency.
pub const DEFAULT_BUDGET_CAP: f64 = 25.0;

pub const DEFAULT_RENDER_DPI: u32 = 100;
pub const DEFAULT_RENDER_FALLBACK_DPI: u32 = 60;
pub const DEFAULT_MAX_IMAGE_DIM: u32 = 1568;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 20 * 1024 * 1024;

/// USD per million input units.
pub const DEFAULT_INPUT_PRICE_PER_MILLION: f64 = 3.0;
/// USD per million output units.
pub const DEFAULT_OUTPUT_PRICE_PER_MILLION: f64 = 15.0;
/// Fixed USD → reporting-currency conversion.
pub const DEFAULT_EXCHANGE_RATE: f64 = 0.92;
pub const REPORTING_CURRENCY: &str = "EUR";

/// Confidence assigned when the service reply cannot be parsed.
pub const FALLBACK_CONFIDENCE: u8 = 50;

/// Lower bound of the high-confidence report band.
pub const HIGH_CONFIDENCE_MIN: u8 = 90;
/// Lower bound of the medium-confidence report band.
pub const MEDIUM_CONFIDENCE_MIN: u8 = 70;

/// Checkpoint on-disk format version.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

pub const DEFAULT_CHECKPOINT_FILENAME: &str = "checkpoint.json";
pub const DEFAULT_FACTS_CACHE_FILENAME: &str = "facts.jsonl";
pub const DEFAULT_REPORT_FILENAME: &str = "report.json";

/// Retries after the first failed verification call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// First backoff delay; doubles per retry.
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

pub const DEFAULT_VERIFY_WORKERS: usize = 1;
pub const DEFAULT_EXTRACT_WORKERS: usize = 4;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_OUTPUT_UNITS: u32 = 1_024;
/// Image pixels billed as one input unit by the verification service.
pub const IMAGE_PIXELS_PER_UNIT: u64 = 750;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
