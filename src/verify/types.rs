use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::IMAGE_PIXELS_PER_UNIT;
use crate::governor::Cost;
use crate::render::PageImage;

/// Decision for one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Not verified (yet).
    #[default]
    Pending,
    Match,
    NoMatch,
    /// Verification was attempted and failed.
    Error,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pending => "pending",
            Verdict::Match => "match",
            Verdict::NoMatch => "no_match",
            Verdict::Error => "error",
        }
    }

    /// `true` for verdicts that are not revisited on resume.
    pub fn is_final(&self) -> bool {
        matches!(self, Verdict::Match | Verdict::NoMatch)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metered units reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_units: u64,
    pub output_units: u64,
}

/// Identifies the pair being verified; sent alongside the images.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationContext {
    pub left_id: String,
    pub right_id: String,
    pub similarity: Option<f64>,
}

impl VerificationContext {
    pub fn describe(&self) -> String {
        let similarity = self
            .similarity
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "Document A: {}\nDocument B: {}\nText similarity: {}\n\
             The first images are pages of document A, \
             the remaining images are pages of document B.",
            self.left_id, self.right_id, similarity
        )
    }
}

/// One request to the verification service.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub instruction: Arc<str>,
    pub context: String,
    pub left: Arc<Vec<PageImage>>,
    pub right: Arc<Vec<PageImage>>,
}

impl ServiceRequest {
    /// Most units this request can be billed for when the reply is capped at
    /// `max_output_units`.
    ///
    /// Text counts one unit per byte. Images count one unit per
    /// [`IMAGE_PIXELS_PER_UNIT`] pixels, or one per byte when the dimensions are unknown.
    pub fn usage_bound(&self, max_output_units: u32) -> Usage {
        let text = (self.instruction.len() + self.context.len()) as u64;
        let images: u64 = self
            .left
            .iter()
            .chain(self.right.iter())
            .map(image_units_bound)
            .sum();
        Usage {
            input_units: text + images,
            output_units: u64::from(max_output_units),
        }
    }
}

fn image_units_bound(image: &PageImage) -> u64 {
    match image.dimensions() {
        Some((width, height)) => {
            (u64::from(width) * u64::from(height)).div_ceil(IMAGE_PIXELS_PER_UNIT)
        }
        None => image.len() as u64,
    }
}

/// Raw reply from the verification service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceResponse {
    pub text: String,
    pub usage: Usage,
}

/// Parsed, priced result of verifying one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    /// 0–100.
    pub confidence: u8,
    pub reasoning: String,
    /// Set when the reply could not be parsed and defaults were applied.
    pub needs_review: bool,
    pub cost: Cost,
    pub usage: Usage,
    /// Calls made, including retries.
    pub attempts: u32,
}

impl VerificationOutcome {
    /// Outcome for a pair whose calls all failed. Nothing was billed.
    pub fn failed(reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            verdict: Verdict::Error,
            confidence: 0,
            reasoning: reason.into(),
            needs_review: false,
            cost: Cost::ZERO,
            usage: Usage::default(),
            attempts,
        }
    }
}
