//! Ledger persistence
//!
//! Provides the store abstraction the ledger is written against, an
//! in-memory store for tests, and a durable JSON file store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::types::{LedgerEntry, Result, StoreError};

/// Current on-disk format version
const STORE_VERSION: u32 = 1;

/// Ledger store trait for different storage backends
///
/// Implementations serialize their own writes; every mutating call is
/// durable before it returns.
pub trait LedgerStore: Send + Sync {
    /// Get an entry by relative path
    fn get(&self, relative_path: &str) -> Result<Option<LedgerEntry>>;
    /// Insert or replace the entry keyed by its relative path
    fn upsert(&self, entry: &LedgerEntry) -> Result<()>;
    /// List all entries, ordered by relative path
    fn list(&self) -> Result<Vec<LedgerEntry>>;
}

fn lock_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(format!("Lock error: {}", e))
}

// ============================================================
// In-memory store
// ============================================================

/// Map-backed store, lost on drop
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: RwLock<BTreeMap<String, LedgerEntry>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn get(&self, relative_path: &str) -> Result<Option<LedgerEntry>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.get(relative_path).cloned())
    }

    fn upsert(&self, entry: &LedgerEntry) -> Result<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        entries.insert(entry.relative_path.clone(), entry.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.values().cloned().collect())
    }
}

// ============================================================
// JSON file store
// ============================================================

/// Stored ledger data structure
///
/// Records are kept as raw JSON values so one bad record cannot take the
/// whole file down with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredLedger {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: BTreeMap<String, LedgerEntry>,
    /// Records that failed to parse, written back untouched until replaced
    quarantined: BTreeMap<String, serde_json::Value>,
}

/// JSON file-based ledger store
///
/// Every upsert rewrites the file atomically before returning.
#[derive(Debug)]
pub struct JsonLedgerStore {
    path: PathBuf,
    state: RwLock<LedgerState>,
}

impl JsonLedgerStore {
    /// Open (or create) a JSON ledger store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let state = Self::load(&path)?;
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn load(path: &Path) -> Result<LedgerState> {
        let mut state = LedgerState::default();
        if !path.exists() {
            return Ok(state);
        }

        let content = std::fs::read(path)?;
        let stored: StoredLedger = match serde_json::from_slice(&content) {
            Ok(stored) => stored,
            Err(e) => {
                let backup = Self::quarantine_file(path)?;
                tracing::warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "ledger file is unreadable, starting empty"
                );
                return Ok(state);
            }
        };

        for (key, value) in stored.entries {
            match serde_json::from_value::<LedgerEntry>(value.clone()) {
                Ok(entry) if entry.relative_path == key => {
                    state.entries.insert(key, entry);
                }
                Ok(entry) => {
                    tracing::warn!(
                        key = %key,
                        relative_path = %entry.relative_path,
                        "ledger record key does not match its path, treating as absent"
                    );
                    state.quarantined.insert(key, value);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "corrupt ledger record, treating as absent");
                    state.quarantined.insert(key, value);
                }
            }
        }

        Ok(state)
    }

    /// Move an unreadable ledger file aside
    fn quarantine_file(path: &Path) -> Result<PathBuf> {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let mut backup = path.as_os_str().to_owned();
        backup.push(format!(".corrupt-{}", stamp));
        let backup = PathBuf::from(backup);
        std::fs::rename(path, &backup)?;
        Ok(backup)
    }

    fn flush(&self, state: &LedgerState) -> Result<()> {
        let mut entries = state.quarantined.clone();
        for (key, entry) in &state.entries {
            entries.insert(key.clone(), serde_json::to_value(entry)?);
        }

        let stored = StoredLedger {
            version: STORE_VERSION,
            entries,
        };
        let content = serde_json::to_string_pretty(&stored)?;
        crate::ocr::write_atomic(&self.path, content.as_bytes())?;
        Ok(())
    }

    /// Get the number of readable entries
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Check if store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for JsonLedgerStore {
    fn get(&self, relative_path: &str) -> Result<Option<LedgerEntry>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.entries.get(relative_path).cloned())
    }

    fn upsert(&self, entry: &LedgerEntry) -> Result<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let previous = state
            .entries
            .insert(entry.relative_path.clone(), entry.clone());
        let quarantined = state.quarantined.remove(&entry.relative_path);

        if let Err(e) = self.flush(&state) {
            // Keep memory consistent with what is on disk
            match previous {
                Some(prev) => {
                    state.entries.insert(entry.relative_path.clone(), prev);
                }
                None => {
                    state.entries.remove(&entry.relative_path);
                }
            }
            if let Some(value) = quarantined {
                state.quarantined.insert(entry.relative_path.clone(), value);
            }
            return Err(e);
        }

        Ok(())
    }

    fn list(&self) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.entries.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::ProcessingStatus;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_upsert_and_get() {
        let store = MemoryLedgerStore::new();
        assert!(store.is_empty());

        let entry = LedgerEntry::new("a.png", "h1");
        store.upsert(&entry).unwrap();
        assert_eq!(store.get("a.png").unwrap(), Some(entry.clone()));
        assert!(store.get("b.png").unwrap().is_none());

        let mut updated = entry;
        updated.status = ProcessingStatus::Completed;
        store.upsert(&updated).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("a.png").unwrap().unwrap().status,
            ProcessingStatus::Completed
        );
    }

    #[test]
    fn test_memory_store_list_is_ordered() {
        let store = MemoryLedgerStore::new();
        store.upsert(&LedgerEntry::new("c.png", "3")).unwrap();
        store.upsert(&LedgerEntry::new("a.png", "1")).unwrap();
        store.upsert(&LedgerEntry::new("b.png", "2")).unwrap();
        let paths: Vec<_> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.relative_path)
            .collect();
        assert_eq!(paths, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_json_store_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db").join("ledger.json");
        let store = JsonLedgerStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_json_store_upsert_is_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = JsonLedgerStore::open(&path).unwrap();

        store.upsert(&LedgerEntry::new("p1.png", "h1")).unwrap();
        assert!(path.exists());

        // A second handle sees the write without any explicit flush
        let reopened = JsonLedgerStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("p1.png").unwrap().unwrap().content_hash, "h1");
    }

    #[test]
    fn test_json_store_corrupt_record_is_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let good = serde_json::to_value(LedgerEntry::new("good.png", "h1")).unwrap();
        let doc = serde_json::json!({
            "version": 1,
            "entries": {
                "good.png": good,
                "bad.png": {"relative_path": "bad.png", "status": "exploded"},
            }
        });
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        let store = JsonLedgerStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get("bad.png").unwrap().is_none());
        store.upsert(&LedgerEntry::new("good.png", "h2")).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("exploded"));
    }

    #[test]
    fn test_json_store_quarantine_survives_flush_until_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let doc = serde_json::json!({
            "version": 1,
            "entries": {"bad.png": {"oops": true}}
        });
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        let store = JsonLedgerStore::open(&path).unwrap();
        store.upsert(&LedgerEntry::new("other.png", "h")).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("oops"));

        store.upsert(&LedgerEntry::new("bad.png", "h2")).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("oops"));
    }

    #[test]
    fn test_json_store_mismatched_key_is_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let entry = serde_json::to_value(LedgerEntry::new("real.png", "h1")).unwrap();
        let doc = serde_json::json!({"version": 1, "entries": {"other.png": entry}});
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        let store = JsonLedgerStore::open(&path).unwrap();
        assert!(store.get("other.png").unwrap().is_none());
        assert!(store.get("real.png").unwrap().is_none());
    }

    #[test]
    fn test_json_store_unreadable_file_is_moved_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{{{ not json").unwrap();

        let store = JsonLedgerStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(!path.exists());

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    // LED-002: UTF-8 でない台帳ファイルも退避して空から始める
    #[test]
    fn test_json_store_non_utf8_file_is_moved_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, [0xff, 0xfe, b'{']).unwrap();

        let store = JsonLedgerStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(!path.exists());

        store.upsert(&LedgerEntry::new("a.png", "h1")).unwrap();
        let reopened = JsonLedgerStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);

        let backups = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(backups, 1);
    }
}
