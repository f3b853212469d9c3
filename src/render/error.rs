use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned while rendering pages.
pub enum RenderError {
    /// The renderer process could not be started.
    #[error("failed to spawn renderer: {reason}")]
    Spawn { reason: String },

    /// The renderer ran but did not produce images.
    #[error("failed to render {path}: {reason}")]
    Failed { path: PathBuf, reason: String },

    #[error("rendering {path} timed out after {timeout:?}")]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("renderer produced no pages for {path}")]
    NoPages { path: PathBuf },

    /// The pair is above the payload limit even at the fallback resolution.
    #[error("rendered payload of {bytes} bytes exceeds the {limit} byte limit")]
    Oversized { bytes: usize, limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;
