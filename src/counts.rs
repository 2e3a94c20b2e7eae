//! Cumulative label counter store.
//!
//! Tracks how many times each content label has been acted on across the
//! lifetime of the agent. Counts live in memory behind a mutex, are loaded
//! from disk once at startup, and are flushed back at session teardown and
//! on shutdown. Anything incremented after the last successful flush is lost
//! on abrupt termination; that window is accepted and kept small by flushing
//! every session.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

/// Label to cumulative count. BTreeMap keeps the on-disk representation in a
/// stable order.
pub type LabelCounts = BTreeMap<String, u64>;

/// Persistence errors for the counter store.
#[derive(Debug)]
pub enum PersistenceError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "counts IO error: {e}"),
            PersistenceError::Parse(e) => write!(f, "counts parse error: {e}"),
            PersistenceError::Serialize(e) => write!(f, "counts serialize error: {e}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// Thread-safe label → count map with optional on-disk persistence.
pub struct LabelCounterStore {
    counts: Mutex<LabelCounts>,
    persist_path: Option<PathBuf>,
}

impl LabelCounterStore {
    /// In-memory only store.
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(LabelCounts::new()),
            persist_path: None,
        }
    }

    /// Store backed by a JSON file. Previously persisted counts are loaded
    /// as the initial value; a missing file starts from zero.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut store = Self::new();
        store.persist_path = Some(path);

        match store.load() {
            Ok(loaded) if loaded > 0 => debug!(labels = loaded, "loaded persisted label counts"),
            Ok(_) => {}
            Err(e) => warn!("could not load previous label counts: {e}"),
        }

        store
    }

    /// Increment a label's count by one.
    pub fn increment(&self, label: &str) {
        let mut counts = self.lock();
        *counts.entry(label.to_string()).or_insert(0) += 1;
    }

    /// Copy of the current counts.
    pub fn snapshot(&self) -> LabelCounts {
        self.lock().clone()
    }

    /// Total actions across all labels.
    pub fn total(&self) -> u64 {
        self.lock().values().sum()
    }

    /// Write the current counts to the persistence path.
    ///
    /// A failure leaves the in-memory counts untouched so the next flush can
    /// retry; callers log and continue.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };

        let snapshot = self.snapshot();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| PersistenceError::Io(e.to_string()))?;

        debug!(labels = snapshot.len(), "flushed label counts");
        Ok(())
    }

    /// Replace in-memory counts with the persisted ones, returning how many
    /// labels were loaded.
    fn load(&self) -> Result<usize, PersistenceError> {
        let Some(path) = &self.persist_path else {
            return Ok(0);
        };
        if !path.exists() {
            return Ok(0);
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| PersistenceError::Io(e.to_string()))?;
        let loaded: LabelCounts =
            serde_json::from_str(&content).map_err(|e| PersistenceError::Parse(e.to_string()))?;

        let len = loaded.len();
        *self.lock() = loaded;
        Ok(len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LabelCounts> {
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LabelCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cadence-counts-{name}-{}", std::process::id()))
    }

    #[test]
    fn test_increment_and_snapshot() {
        let store = LabelCounterStore::new();
        for _ in 0..5 {
            store.increment("love");
        }
        store.increment("judo");

        let snapshot = store.snapshot();
        assert_eq!(snapshot.get("love"), Some(&5));
        assert_eq!(snapshot.get("judo"), Some(&1));
        assert_eq!(snapshot.get("programming"), None);
        assert_eq!(store.total(), 6);
    }

    #[test]
    fn test_flush_and_reload_round_trip() {
        let path = temp_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        {
            let store = LabelCounterStore::with_persistence(path.clone());
            store.increment("café ☕");
            store.increment("café ☕");
            store.increment("robotics");
            store.flush().unwrap();
        }

        let reloaded = LabelCounterStore::with_persistence(path.clone());
        assert_eq!(reloaded.snapshot().get("café ☕"), Some(&2));
        assert_eq!(reloaded.snapshot().get("robotics"), Some(&1));

        // Flushing what was just loaded is a no-op on the representation.
        let before = std::fs::read_to_string(&path).unwrap();
        reloaded.flush().unwrap();
        let after = std::fs::read_to_string(&path).unwrap();
        assert_eq!(before, after);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let store = LabelCounterStore::with_persistence(temp_path("missing-never-created"));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_flush_without_persistence_is_ok() {
        let store = LabelCounterStore::new();
        store.increment("x");
        assert!(store.flush().is_ok());
    }
}
