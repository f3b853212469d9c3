use std::collections::HashMap;

use super::stopwords::is_stop_word;
use crate::constants::{COSINE_WEIGHT, OVERLAP_WEIGHT};

/// Tokens of this many characters or fewer carry no signal.
const MIN_TOKEN_CHARS: usize = 3;

/// Term multiset of one text, built once and reused for every pair the text appears in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermProfile {
    counts: HashMap<String, u64>,
    total: u64,
    norm_sq: u64,
}

impl TermProfile {
    pub fn new(text: &str) -> Self {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for token in text.split_whitespace() {
            if token.chars().count() < MIN_TOKEN_CHARS || is_stop_word(token) {
                continue;
            }
            *counts.entry(token.to_string()).or_default() += 1;
        }

        let total = counts.values().sum();
        let norm_sq = counts.values().map(|c| c * c).sum();

        Self {
            counts,
            total,
            norm_sq,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct terms.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Total term occurrences.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, term: &str) -> u64 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    /// Σmin and dot product over the terms both profiles share.
    fn shared(&self, other: &Self) -> (u64, u64) {
        let (small, large) = if self.counts.len() <= other.counts.len() {
            (self, other)
        } else {
            (other, self)
        };

        small
            .counts
            .iter()
            .filter_map(|(term, &a)| large.counts.get(term).map(|&b| (a, b)))
            .fold((0, 0), |(min_sum, dot), (a, b)| {
                (min_sum + a.min(b), dot + a * b)
            })
    }
}

/// Σmin(count) / Σmax(count) over the union of terms. `0.0` if either side is empty.
pub fn weighted_overlap(a: &TermProfile, b: &TermProfile) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (min_sum, _) = a.shared(b);
    // Σmax = |a| + |b| - Σmin
    let max_sum = a.total + b.total - min_sum;
    min_sum as f64 / max_sum as f64
}

/// Term-frequency cosine. `0.0` if either side is empty or nothing is shared.
pub fn cosine(a: &TermProfile, b: &TermProfile) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (_, dot) = a.shared(b);
    if dot == 0 {
        return 0.0;
    }
    dot as f64 / ((a.norm_sq as f64) * (b.norm_sq as f64)).sqrt()
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Blended score in `[0, 1]`, rounded to three decimals.
pub fn score_profiles(a: &TermProfile, b: &TermProfile) -> f64 {
    let blended = OVERLAP_WEIGHT * weighted_overlap(a, b) + COSINE_WEIGHT * cosine(a, b);
    round3(blended.clamp(0.0, 1.0))
}

/// Similarity of two normalized texts.
pub fn score(a: &str, b: &str) -> f64 {
    score_profiles(&TermProfile::new(a), &TermProfile::new(b))
}
