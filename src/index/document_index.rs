use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use super::extract::FactsExtractor;
use super::store::FactsStore;
use super::types::{DocumentFacts, DocumentRef, FactsRecord};
use crate::hashing::metadata_fingerprint;

/// Memoized access to [`DocumentFacts`].
///
/// Lookups go to the injected [`FactsStore`] first; misses run the extractor on the
/// blocking pool and are written back immediately.
pub struct DocumentIndex<E: FactsExtractor, S: FactsStore> {
    extractor: Arc<E>,
    store: Arc<S>,
    text_pages: u32,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<E: FactsExtractor, S: FactsStore> std::fmt::Debug for DocumentIndex<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("text_pages", &self.text_pages)
            .field("cached", &self.store.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish_non_exhaustive()
    }
}

impl<E: FactsExtractor, S: FactsStore> DocumentIndex<E, S> {
    pub fn new(extractor: Arc<E>, store: Arc<S>, text_pages: u32) -> Self {
        Self {
            extractor,
            store,
            text_pages: text_pages.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn extractor(&self) -> &Arc<E> {
        &self.extractor
    }

    pub fn text_pages(&self) -> u32 {
        self.text_pages
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the facts for `doc`, extracting and caching them on first access.
    #[instrument(
        skip(self, doc),
        fields(reference_id = %doc.reference_id, collection = %doc.collection)
    )]
    pub async fn facts(&self, doc: &DocumentRef) -> DocumentFacts {
        let key = doc.cache_key();

        let fingerprint = match tokio::fs::metadata(&doc.path).await {
            Ok(meta) => metadata_fingerprint(&meta, self.text_pages),
            Err(e) => {
                // Not cached: the file may reappear on the next run.
                warn!(path = %doc.path.display(), error = %e, "Cannot stat document");
                return DocumentFacts::failed(format!("cannot stat file: {e}"));
            }
        };

        if let Some(facts) = self.store.get(&key, &fingerprint) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return facts;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let extractor = Arc::clone(&self.extractor);
        let path = doc.path.clone();
        let pages = self.text_pages;
        let facts = tokio::task::spawn_blocking(move || extractor.extract(&path, pages))
            .await
            .unwrap_or_else(|e| DocumentFacts::failed(format!("extraction task failed: {e}")));

        debug!(
            page_count = facts.page_count,
            method = ?facts.extraction_method,
            "Facts extracted"
        );

        let record = FactsRecord {
            path: key,
            fingerprint,
            facts: facts.clone(),
        };
        if let Err(e) = self.store.put(record) {
            warn!(path = %doc.path.display(), error = %e, "Failed to persist extracted facts");
        }

        facts
    }

    /// Facts for many documents with at most `workers` extractions in flight.
    ///
    /// Output order matches `docs`.
    pub async fn facts_for_all(
        &self,
        docs: &[Arc<DocumentRef>],
        workers: usize,
    ) -> Vec<DocumentFacts> {
        stream::iter(docs.iter())
            .map(|doc| self.facts(doc))
            .buffered(workers.max(1))
            .collect()
            .await
    }
}
