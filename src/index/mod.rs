//! Document index: collection discovery and memoized per-document facts.
//!
//! Enumeration is cheap and repeatable. Facts (page count, leading text, extraction
//! method) are expensive, so they are cached by path and file fingerprint and persisted
//! one record at a time.

pub mod document_index;
pub mod enumerate;
pub mod error;
pub mod extract;
pub mod store;
pub mod types;


pub use document_index::DocumentIndex;
pub use enumerate::{CollectionSpec, DEFAULT_INCLUDE_GLOB, Enumeration, enumerate, walk};
pub use error::{IndexError, IndexResult};
#[cfg(any(test, feature = "mock"))]
pub use extract::MockExtractor;
pub use extract::{FactsExtractor, LopdfExtractor, classify_text, normalize_text};
pub use store::{FactsStore, JsonlFactsStore, MemoryFactsStore};
pub use types::{
    CollectionTag, DocumentFacts, DocumentRef, ExtractionMethod, FactsRecord, IndexStats,
};
