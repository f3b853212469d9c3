use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by a verification backend.
pub enum VerifyError {
    /// The service asked us to slow down.
    #[error("rate limited by verification service")]
    RateLimited { retry_after: Option<Duration> },

    /// 5xx from the service.
    #[error("verification service error {status}: {body}")]
    Service { status: u16, body: String },

    /// 4xx other than rate limiting. Retrying the same request will not help.
    #[error("verification request rejected {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Connection, timeout or TLS failure.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The service answered with something we cannot decode.
    #[error("failed to decode verification response: {reason}")]
    Decode { reason: String },

    #[error("verification backend misconfigured: {reason}")]
    Config { reason: String },
}

impl VerifyError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VerifyError::RateLimited { .. }
                | VerifyError::Service { .. }
                | VerifyError::Transport { .. }
                | VerifyError::Decode { .. }
        )
    }

    /// Server-suggested wait, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            VerifyError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for VerifyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            VerifyError::Decode {
                reason: e.to_string(),
            }
        } else {
            VerifyError::Transport {
                reason: e.to_string(),
            }
        }
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;
