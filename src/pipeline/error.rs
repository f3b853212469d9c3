use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::index::IndexError;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("document index error: {0}")]
    Index(#[from] IndexError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("stage task failed: {reason}")]
    Task { reason: String },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
