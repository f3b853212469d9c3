//! Collection discovery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::error::{IndexError, IndexResult};
use super::types::{CollectionTag, DocumentRef};

/// Default include pattern for both collections.
pub const DEFAULT_INCLUDE_GLOB: &str = "*.pdf";

/// Where a collection lives and which files belong to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub tag: CollectionTag,
    pub root: PathBuf,
    /// Matched case-insensitively against the file name.
    pub include_glob: String,
    /// Optional file-name prefix (case-insensitive) that marks membership.
    pub prefix: Option<String>,
}

impl CollectionSpec {
    pub fn new<P: Into<PathBuf>>(tag: CollectionTag, root: P) -> Self {
        Self {
            tag,
            root: root.into(),
            include_glob: DEFAULT_INCLUDE_GLOB.to_string(),
            prefix: None,
        }
    }

    pub fn include_glob(mut self, pattern: &str) -> Self {
        self.include_glob = pattern.to_string();
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    fn matcher(&self) -> IndexResult<GlobMatcher> {
        GlobBuilder::new(&self.include_glob)
            .case_insensitive(true)
            .literal_separator(false)
            .build()
            .map(|g| g.compile_matcher())
            .map_err(|e| IndexError::InvalidPattern {
                pattern: self.include_glob.clone(),
                reason: e.to_string(),
            })
    }

    /// Reference id for an accepted file: the stem with the collection prefix removed.
    fn reference_id(&self, path: &Path) -> Option<String> {
        let stem = reference_id_for(path)?;
        let id = match &self.prefix {
            Some(prefix) if stem.len() > prefix.len() && stem.is_char_boundary(prefix.len()) => {
                stem[prefix.len()..].trim().to_string()
            }
            _ => stem,
        };
        Some(id).filter(|s| !s.is_empty())
    }

    fn has_prefix(&self, file_name: &str) -> bool {
        match &self.prefix {
            Some(prefix) => file_name
                .to_lowercase()
                .starts_with(&prefix.to_lowercase()),
            None => true,
        }
    }
}

/// Outcome of enumerating one collection.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// First document seen for every reference id, in sorted path order.
    pub documents: Vec<Arc<DocumentRef>>,
    /// Later files whose reference id was already taken. Counted, never matched.
    pub duplicates: Vec<PathBuf>,
    /// Files skipped for not matching the naming convention.
    pub skipped: usize,
}

impl Enumeration {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Reference id for a file: its stem, trimmed.
pub fn reference_id_for(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Lazily walks a collection in sorted order, yielding `(path, matches_convention)`.
///
/// Restartable: every call starts a fresh walk with the same ordering.
pub fn walk(spec: &CollectionSpec) -> IndexResult<impl Iterator<Item = (PathBuf, bool)> + '_> {
    if !spec.root.is_dir() {
        return Err(IndexError::CollectionUnreadable {
            path: spec.root.clone(),
        });
    }
    let matcher = spec.matcher()?;

    let iter = WalkDir::new(&spec.root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(move |e| {
            let file_name = e.file_name().to_string_lossy();
            let accepted = matcher.is_match(file_name.as_ref()) && spec.has_prefix(&file_name);
            (e.into_path(), accepted)
        });

    Ok(iter)
}

/// Discovers the documents of one collection and assigns reference ids.
pub fn enumerate(spec: &CollectionSpec) -> IndexResult<Enumeration> {
    let mut seen = HashSet::new();
    let mut out = Enumeration::default();

    for (path, accepted) in walk(spec)? {
        if !accepted {
            out.skipped += 1;
            continue;
        }

        let Some(reference_id) = spec.reference_id(&path) else {
            out.skipped += 1;
            continue;
        };

        if !seen.insert(reference_id.clone()) {
            debug!(
                collection = %spec.tag,
                reference_id = %reference_id,
                path = %path.display(),
                "Duplicate reference id, keeping first"
            );
            out.duplicates.push(path);
            continue;
        }

        out.documents
            .push(Arc::new(DocumentRef::new(path, spec.tag, reference_id)));
    }

    info!(
        collection = %spec.tag,
        root = %spec.root.display(),
        documents = out.documents.len(),
        duplicates = out.duplicates.len(),
        skipped = out.skipped,
        "Collection enumerated"
    );

    Ok(out)
}
