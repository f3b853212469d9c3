//! Lexical similarity between two normalized leading texts.
//!
//! The score blends a weighted multiset overlap with a term-frequency cosine. Both are
//! computed on integer term counts, so the result is exact, symmetric and independent
//! of token order.

pub mod scorer;
pub mod stopwords;


pub use scorer::{TermProfile, cosine, round3, score, score_profiles, weighted_overlap};
pub use stopwords::is_stop_word;
