use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::{CheckpointError, CheckpointResult};
use super::types::{PairRecord, RunState, StagePhase, VerificationRecord};
use crate::constants::CHECKPOINT_FORMAT_VERSION;
use crate::governor::Cost;
use crate::index::FactsRecord;

/// Owns the [`RunState`] and writes it atomically.
///
/// Other components only touch the state through the narrow mutators below.
#[derive(Debug)]
pub struct CheckpointManager {
    path: PathBuf,
    state: Mutex<RunState>,
    /// Serializes writers so an older snapshot never replaces a newer one.
    write_lock: Mutex<()>,
    resumed: bool,
    failures: AtomicU64,
}

impl CheckpointManager {
    /// Loads the checkpoint at `path`, or starts a fresh run if there is none.
    pub fn open<P: AsRef<Path>>(path: P) -> CheckpointResult<Self> {
        let path = path.as_ref().to_path_buf();

        let (state, resumed) = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let mut state: RunState =
                serde_json::from_str(&raw).map_err(|e| CheckpointError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            if state.format_version > CHECKPOINT_FORMAT_VERSION {
                return Err(CheckpointError::UnsupportedVersion {
                    found: state.format_version,
                    supported: CHECKPOINT_FORMAT_VERSION,
                });
            }
            state.ledger.reindex();
            info!(
                path = %path.display(),
                run_id = %state.run_id,
                stage1 = state.survivors.stage1.as_ref().map(Vec::len),
                stage2 = state.survivors.stage2.as_ref().map(Vec::len),
                verified = state.ledger.results.len(),
                spent = %state.ledger.cumulative_cost,
                "Resuming from checkpoint"
            );
            (state, true)
        } else {
            (RunState::default(), false)
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
            write_lock: Mutex::new(()),
            resumed,
            failures: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` if the state was loaded from an existing file.
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    pub fn run_id(&self) -> String {
        self.state.lock().run_id.clone()
    }

    pub fn stage1(&self) -> Option<Vec<PairRecord>> {
        self.state.lock().survivors.stage1.clone()
    }

    pub fn stage2(&self) -> Option<Vec<PairRecord>> {
        self.state.lock().survivors.stage2.clone()
    }

    /// Records Stage 1 survivors. Later stages computed from older survivors are dropped.
    pub fn record_stage1(&self, pairs: Vec<PairRecord>) {
        let mut state = self.state.lock();
        state.survivors.stage1 = Some(pairs);
        state.survivors.stage2 = None;
    }

    pub fn record_stage2(&self, pairs: Vec<PairRecord>) {
        self.state.lock().survivors.stage2 = Some(pairs);
    }

    pub fn facts(&self) -> Vec<FactsRecord> {
        self.state.lock().facts.entries.clone()
    }

    pub fn record_facts(&self, entries: Vec<FactsRecord>) {
        self.state.lock().facts.entries = entries;
    }

    /// Adds a verification result and its cost to the ledger.
    pub fn record_verification(&self, record: VerificationRecord, calls: u32) {
        self.state.lock().ledger.record(record, calls);
    }

    /// Earlier result for a pair, if any.
    pub fn verified(&self, left: &str, right: &str) -> Option<VerificationRecord> {
        self.state.lock().ledger.get(left, right).cloned()
    }

    pub fn cumulative_cost(&self) -> Cost {
        self.state.lock().ledger.cumulative_cost
    }

    pub fn calls_made(&self) -> u64 {
        self.state.lock().ledger.calls_made
    }

    pub fn add_timing(&self, phase: StagePhase, elapsed: Duration) {
        self.state.lock().timings.add(phase, elapsed);
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RunState {
        self.state.lock().clone()
    }

    /// Writes the state: temp file in the same directory, synced, then renamed over the
    /// previous checkpoint.
    pub fn save(&self) -> CheckpointResult<()> {
        let _writer = self.write_lock.lock();

        let bytes = {
            let mut state = self.state.lock();
            state.saved_at = Some(chrono::Utc::now().to_rfc3339());
            serde_json::to_vec_pretty(&*state)
                .map_err(|e| CheckpointError::Serialize(e.to_string()))?
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| CheckpointError::Io(e.error))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Checkpoint saved");
        Ok(())
    }

    /// Saves, logging and counting a failure instead of returning it.
    pub fn save_or_warn(&self) -> bool {
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Checkpoint write failed, continuing"
                );
                false
            }
        }
    }

    /// Failed writes so far in this process.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
