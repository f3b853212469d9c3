//! Run-state persistence for resumable runs.
//!
//! The checkpoint holds the facts cache, the survivor list of every completed stage and
//! the cost ledger. A run that finds a checkpoint resumes every stage whose survivor
//! list is present and skips pairs that already have a final verdict.

pub mod error;
pub mod manager;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{CheckpointError, CheckpointResult};
pub use manager::CheckpointManager;
pub use types::{
    CostLedger, DocumentFactsCache, PairRecord, RunState, StagePhase, StageSurvivors,
    StageTimings, VerificationRecord,
};
