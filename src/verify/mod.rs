//! External visual verification of candidate pairs.
//!
//! [`VerificationClient`] wraps a [`VerificationBackend`] with retry, tolerant reply
//! parsing and pricing. The production backend talks to a messages-style HTTP API;
//! tests use [`MockVerificationBackend`].

pub mod backend;
pub mod client;
pub mod error;
pub mod parse;
pub mod pricing;
pub mod retry;
pub mod types;

#[cfg(test)]
mod tests;

#[cfg(any(test, feature = "mock"))]
pub use backend::MockVerificationBackend;
pub use backend::{HttpBackendConfig, HttpVerificationBackend, VerificationBackend};
pub use client::{DEFAULT_INSTRUCTION, VerificationClient};
pub use error::{VerifyError, VerifyResult};
pub use parse::{ParsedReply, parse_reply};
pub use pricing::Pricing;
pub use retry::RetryConfig;
pub use types::{
    ServiceRequest, ServiceResponse, Usage, VerificationContext, VerificationOutcome, Verdict,
};
