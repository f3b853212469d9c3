//! Stage 2: lexical similarity filter.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use super::types::CandidatePair;
use crate::index::DocumentFacts;
use crate::similarity::{TermProfile, score_profiles};

/// Scores every pair and keeps those at or above `threshold`, best first.
///
/// A document without facts or without leading text scores `0.0` against everything.
/// Ties keep their Stage 1 order.
#[instrument(skip_all, fields(pairs = pairs.len(), threshold))]
pub fn content_filter(
    pairs: Vec<CandidatePair>,
    facts: &HashMap<PathBuf, DocumentFacts>,
    threshold: f64,
) -> Vec<CandidatePair> {
    let mut profiles: HashMap<&Path, TermProfile> = HashMap::new();
    let empty = TermProfile::default();

    for pair in &pairs {
        for doc in [&pair.left, &pair.right] {
            profiles.entry(doc.path.as_path()).or_insert_with(|| {
                facts
                    .get(&doc.path)
                    .map(|f| TermProfile::new(&f.leading_text))
                    .unwrap_or_default()
            });
        }
    }

    let scored: Vec<f64> = pairs
        .iter()
        .map(|pair| {
            let a = profiles.get(pair.left.path.as_path()).unwrap_or(&empty);
            let b = profiles.get(pair.right.path.as_path()).unwrap_or(&empty);
            score_profiles(a, b)
        })
        .collect();

    let mut kept: Vec<CandidatePair> = pairs
        .into_iter()
        .zip(scored)
        .filter(|(_, score)| *score >= threshold)
        .map(|(mut pair, score)| {
            pair.text_similarity = Some(score);
            pair
        })
        .collect();

    // Stable: equal scores keep Stage 1 order.
    kept.sort_by(|a, b| {
        let (a, b) = (a.text_similarity.unwrap_or(0.0), b.text_similarity.unwrap_or(0.0));
        b.total_cmp(&a)
    });

    info!(survivors = kept.len(), "Stage 2 complete");
    kept
}
