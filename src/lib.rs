//! Docmatch library crate (used by the binary and integration tests).
//!
//! Decides which (restricted, reference) document pairs are the same underlying
//! document. Candidate pairs pass through a cascade of increasingly expensive stages:
//!
//! 1. page-count filter ([`pipeline::structural_filter`])
//! 2. leading-text similarity filter ([`pipeline::content_filter`], [`similarity`])
//! 3. visual verification by an external service under a monetary budget
//!    ([`verify`], [`render`], [`governor`])
//!
//! Every stage's survivors and every verdict are checkpointed ([`checkpoint`]) so an
//! interrupted run resumes where it stopped.
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`Config`], [`ConfigError`] - Environment-backed configuration
//! - [`Pipeline`], [`PipelineConfig`], [`PipelineReport`], [`RunSummary`] - Orchestration
//! - [`CandidatePair`], [`Verdict`], [`Cost`] - Pair and money types
//!
//! ## Collaborators
//! - [`FactsExtractor`], [`FactsStore`] - Document facts and their cache
//! - [`PageRenderer`] - Page images for verification
//! - [`VerificationBackend`] - The external verification service
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod governor;
pub mod hashing;
pub mod index;
pub mod pipeline;
pub mod render;
pub mod similarity;
pub mod verify;

pub use checkpoint::{CheckpointError, CheckpointManager, RunState};
pub use config::{Config, ConfigError};
pub use governor::{BudgetGovernor, Cost, RateGovernor};
pub use hashing::{file_fingerprint, metadata_fingerprint};
#[cfg(any(test, feature = "mock"))]
pub use index::MockExtractor;
pub use index::{
    CollectionSpec, CollectionTag, DocumentFacts, DocumentIndex, DocumentRef, ExtractionMethod,
    FactsExtractor, FactsStore, IndexError, IndexStats, JsonlFactsStore, LopdfExtractor,
    MemoryFactsStore,
};
pub use pipeline::{
    CancelFlag, CandidatePair, Pipeline, PipelineConfig, PipelineError, PipelineReport,
    ReportRow, RunOutcome, RunSummary,
};
#[cfg(any(test, feature = "mock"))]
pub use render::MockRenderer;
pub use render::{PageRenderer, PdftoppmRenderer, RenderConfig, RenderError, RenderService};
pub use similarity::{TermProfile, score};
#[cfg(any(test, feature = "mock"))]
pub use verify::MockVerificationBackend;
pub use verify::{
    HttpBackendConfig, HttpVerificationBackend, Pricing, RetryConfig, VerificationBackend,
    VerificationClient, VerificationOutcome, Verdict, VerifyError,
};
