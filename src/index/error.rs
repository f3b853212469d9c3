use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by the document index.
pub enum IndexError {
    /// Collection root is missing or not a directory. Fatal for a run.
    #[error("collection root {path} is not a readable directory")]
    CollectionUnreadable { path: PathBuf },

    /// Include pattern could not be compiled.
    #[error("invalid include pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A document could not be opened or parsed.
    #[error("failed to extract {path}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    /// The document is encrypted.
    #[error("document {path} is encrypted")]
    Encrypted { path: PathBuf },

    /// Facts cache could not be read or appended.
    #[error("facts cache error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IndexResult<T> = Result<T, IndexError>;
