//! Facts cache capability.
//!
//! The index only sees [`FactsStore`]; the run decides whether it is backed by the on-disk
//! JSON-lines cache or an in-memory map.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::error::{IndexError, IndexResult};
use super::types::{DocumentFacts, FactsRecord};

/// Key-value store of [`FactsRecord`]s keyed by document path.
pub trait FactsStore: Send + Sync + 'static {
    /// Returns cached facts if present and recorded under the same fingerprint.
    fn get(&self, path: &str, fingerprint: &str) -> Option<DocumentFacts>;

    /// Stores a record. Durable stores must persist it before returning.
    fn put(&self, record: FactsRecord) -> IndexResult<()>;

    /// Loads records (e.g. from a checkpoint) without re-persisting them.
    fn seed(&self, records: Vec<FactsRecord>);

    /// All records, sorted by path.
    fn records(&self) -> Vec<FactsRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lookup(
    entries: &HashMap<String, FactsRecord>,
    path: &str,
    fingerprint: &str,
) -> Option<DocumentFacts> {
    entries
        .get(path)
        .filter(|r| r.fingerprint == fingerprint)
        .map(|r| r.facts.clone())
}

fn sorted(entries: &HashMap<String, FactsRecord>) -> Vec<FactsRecord> {
    let mut records: Vec<FactsRecord> = entries.values().cloned().collect();
    records.sort_by(|a, b| a.path.cmp(&b.path));
    records
}

/// In-memory store that counts hits and misses.
#[derive(Debug, Default)]
pub struct MemoryFactsStore {
    entries: RwLock<HashMap<String, FactsRecord>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryFactsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl FactsStore for MemoryFactsStore {
    fn get(&self, path: &str, fingerprint: &str) -> Option<DocumentFacts> {
        let found = lookup(&self.entries.read(), path, fingerprint);
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn put(&self, record: FactsRecord) -> IndexResult<()> {
        self.entries.write().insert(record.path.clone(), record);
        Ok(())
    }

    fn seed(&self, records: Vec<FactsRecord>) {
        let mut entries = self.entries.write();
        for record in records {
            entries.entry(record.path.clone()).or_insert(record);
        }
    }

    fn records(&self) -> Vec<FactsRecord> {
        sorted(&self.entries.read())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Append-only JSON-lines cache: one record per line, later lines win.
///
/// Each `put` is flushed before returning, so a crash loses at most the document being
/// extracted. A torn final line is skipped on load.
#[derive(Debug)]
pub struct JsonlFactsStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, FactsRecord>>,
    writer: Mutex<File>,
}

impl JsonlFactsStore {
    pub fn open<P: AsRef<Path>>(path: P) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = HashMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<FactsRecord>(&line) {
                    Ok(record) => {
                        entries.insert(record.path.clone(), record);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            line = line_no + 1,
                            error = %e,
                            "Skipping malformed facts cache line"
                        );
                    }
                }
            }
            debug!(path = %path.display(), records = entries.len(), "Facts cache loaded");
        }

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FactsStore for JsonlFactsStore {
    fn get(&self, path: &str, fingerprint: &str) -> Option<DocumentFacts> {
        lookup(&self.entries.read(), path, fingerprint)
    }

    fn put(&self, record: FactsRecord) -> IndexResult<()> {
        let mut line =
            serde_json::to_vec(&record).map_err(|e| IndexError::Cache(e.to_string()))?;
        line.push(b'\n');

        {
            let mut writer = self.writer.lock();
            writer.write_all(&line)?;
            writer.flush()?;
        }

        self.entries.write().insert(record.path.clone(), record);
        Ok(())
    }

    fn seed(&self, records: Vec<FactsRecord>) {
        let mut entries = self.entries.write();
        for record in records {
            entries.entry(record.path.clone()).or_insert(record);
        }
    }

    fn records(&self) -> Vec<FactsRecord> {
        sorted(&self.entries.read())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}
