use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which of the two source collections a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionTag {
    /// Left side of every pair.
    Restricted,
    /// Right side of every pair.
    Reference,
}

impl CollectionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionTag::Restricted => "restricted",
            CollectionTag::Reference => "reference",
        }
    }
}

impl fmt::Display for CollectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source file. Owned by the index and shared as `Arc<DocumentRef>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub path: PathBuf,
    pub collection: CollectionTag,
    /// Human-readable identifier derived from the filename, unique within a collection.
    pub reference_id: String,
}

impl DocumentRef {
    pub fn new(path: PathBuf, collection: CollectionTag, reference_id: String) -> Self {
        Self {
            path,
            collection,
            reference_id,
        }
    }

    /// Key used by the facts cache.
    pub fn cache_key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// How the leading text of a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Text layer with enough words to compare.
    #[default]
    Digital,
    /// Parsed, but the text layer is below the word threshold (image-only or near it).
    Scanned,
    /// The file could not be opened or parsed.
    Error,
}

/// Derived, immutable facts about one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DocumentFacts {
    /// `0` means unknown; such documents never enter a pair.
    pub page_count: u32,
    /// Normalized text of the leading pages; empty when nothing could be extracted.
    pub leading_text: String,
    pub extraction_method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentFacts {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            page_count: 0,
            leading_text: String::new(),
            extraction_method: ExtractionMethod::Error,
            error: Some(reason.into()),
        }
    }

    /// `true` if the document may take part in pairing.
    pub fn is_usable(&self) -> bool {
        self.page_count > 0 && self.extraction_method != ExtractionMethod::Error
    }

    pub fn is_error(&self) -> bool {
        self.extraction_method == ExtractionMethod::Error
    }
}

/// One cached facts entry as persisted in the facts cache and checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FactsRecord {
    pub path: String,
    pub fingerprint: String,
    pub facts: DocumentFacts,
}

/// Counters gathered while indexing both collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexStats {
    pub restricted_documents: usize,
    pub reference_documents: usize,
    /// Files dropped because their reference id was already taken.
    pub duplicates: usize,
    /// Files outside the naming convention.
    pub skipped_files: usize,
    pub extraction_failures: usize,
    /// Parsed, but the page count could not be determined.
    pub zero_page_documents: usize,
    pub scanned_documents: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl IndexStats {
    /// Folds one document's facts into the counters.
    pub fn observe(&mut self, facts: &DocumentFacts) {
        match facts.extraction_method {
            ExtractionMethod::Error => self.extraction_failures += 1,
            ExtractionMethod::Scanned => self.scanned_documents += 1,
            ExtractionMethod::Digital => {}
        }
        if facts.page_count == 0 && !facts.is_error() {
            self.zero_page_documents += 1;
        }
    }
}
