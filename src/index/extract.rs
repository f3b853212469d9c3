//! Page-count and leading-text extraction.

use std::path::Path;

use tracing::{debug, warn};

use super::error::{IndexError, IndexResult};
use super::types::{DocumentFacts, ExtractionMethod};
use crate::constants::SCANNED_WORD_THRESHOLD;

/// Blocking extraction of [`DocumentFacts`]. Runs on the blocking pool.
///
/// Implementations never fail: any problem becomes [`ExtractionMethod::Error`].
pub trait FactsExtractor: Send + Sync + 'static {
    fn extract(&self, path: &Path, leading_pages: u32) -> DocumentFacts;
}

/// Lower-cases, strips punctuation and collapses whitespace.
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else if c.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.extend(c.to_lowercase());
        }
    }

    out
}

/// Classifies normalized text by word count.
pub fn classify_text(normalized: &str) -> ExtractionMethod {
    if normalized.split_whitespace().count() < SCANNED_WORD_THRESHOLD {
        ExtractionMethod::Scanned
    } else {
        ExtractionMethod::Digital
    }
}

/// PDF extraction backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        Self
    }

    fn try_extract(path: &Path, leading_pages: u32) -> IndexResult<DocumentFacts> {
        let doc = lopdf::Document::load(path).map_err(|e| IndexError::ExtractionFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if doc.is_encrypted() {
            return Err(IndexError::Encrypted {
                path: path.to_path_buf(),
            });
        }

        let pages = doc.get_pages();
        let page_count = pages.len() as u32;
        let wanted: Vec<u32> = pages
            .keys()
            .copied()
            .take(leading_pages as usize)
            .collect();

        // A page without a usable text layer is not an error; it just yields no text.
        let raw = if wanted.is_empty() {
            String::new()
        } else {
            match doc.extract_text(&wanted) {
                Ok(text) => text,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "No text layer on leading pages");
                    String::new()
                }
            }
        };

        let leading_text = normalize_text(&raw);
        let extraction_method = classify_text(&leading_text);

        Ok(DocumentFacts {
            page_count,
            leading_text,
            extraction_method,
            error: None,
        })
    }
}

impl FactsExtractor for LopdfExtractor {
    fn extract(&self, path: &Path, leading_pages: u32) -> DocumentFacts {
        match Self::try_extract(path, leading_pages) {
            Ok(facts) => facts,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Extraction failed");
                DocumentFacts::failed(e.to_string())
            }
        }
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockExtractor;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::RwLock;

    use super::{FactsExtractor, classify_text, normalize_text};
    use crate::index::types::DocumentFacts;

    /// Scripted extractor keyed by file name. Unknown files extract as errors.
    #[derive(Debug, Default)]
    pub struct MockExtractor {
        facts: RwLock<HashMap<String, DocumentFacts>>,
        calls: AtomicUsize,
    }

    impl MockExtractor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Scripts a parseable document; the method is derived from the text.
        pub fn with_document(self, file_name: &str, page_count: u32, text: &str) -> Self {
            let leading_text = normalize_text(text);
            let extraction_method = classify_text(&leading_text);
            self.facts.write().insert(
                file_name.to_string(),
                DocumentFacts {
                    page_count,
                    leading_text,
                    extraction_method,
                    error: None,
                },
            );
            self
        }

        /// Scripts a document that cannot be opened.
        pub fn with_failure(self, file_name: &str, reason: &str) -> Self {
            self.facts
                .write()
                .insert(file_name.to_string(), DocumentFacts::failed(reason));
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FactsExtractor for MockExtractor {
        fn extract(&self, path: &Path, _leading_pages: u32) -> DocumentFacts {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.facts
                .read()
                .get(&name)
                .cloned()
                .unwrap_or_else(|| DocumentFacts::failed(format!("no scripted facts for {name}")))
        }
    }
}
