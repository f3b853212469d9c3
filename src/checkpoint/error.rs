use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by the checkpoint manager.
pub enum CheckpointError {
    /// The file exists but is not a readable checkpoint. Fatal for a run.
    #[error("checkpoint {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Written by a newer, incompatible format.
    #[error("checkpoint format {found} is newer than supported format {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("failed to serialize checkpoint: {0}")]
    Serialize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckpointError {
    /// `true` for errors that must abort the run rather than be logged.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CheckpointError::Corrupt { .. } | CheckpointError::UnsupportedVersion { .. }
        )
    }
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;
