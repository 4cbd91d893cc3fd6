//! Content-addressed processing ledger
//!
//! Maps a relative path and the SHA-256 of its bytes to a processing
//! record. An entry whose stored hash matches the current one is reused
//! as-is; the expensive OCR call only happens for new or changed content.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

use super::store::LedgerStore;
use super::types::{LedgerEntry, LedgerSummary, ProcessingStatus, Result};

/// What the pipeline should do with a discovered item
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run OCR
    Process(ProcessReason),
    /// Unchanged and completed: reload the cached result
    Reuse(LedgerEntry),
    /// Unchanged and skipped earlier: leave alone
    Skip(LedgerEntry),
}

/// Why an item is (re)processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessReason {
    /// No entry for the path
    New,
    /// Stored hash differs
    Changed,
    /// Entry left pending or processing by an earlier run
    Interrupted,
    /// Earlier attempt failed
    Retry,
    /// Completed, but the stored OCR result is missing or unreadable
    CacheMiss,
}

impl ProcessReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessReason::New => "new",
            ProcessReason::Changed => "changed",
            ProcessReason::Interrupted => "interrupted",
            ProcessReason::Retry => "retry",
            ProcessReason::CacheMiss => "cache miss",
        }
    }
}

/// Ledger over an injected store
#[derive(Clone)]
pub struct ContentLedger {
    store: Arc<dyn LedgerStore>,
}

impl ContentLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn lookup(&self, relative_path: &str) -> Result<Option<LedgerEntry>> {
        self.store.get(relative_path)
    }

    /// True if the path is unknown or its stored hash differs
    pub fn needs_processing(&self, relative_path: &str, content_hash: &str) -> Result<bool> {
        Ok(match self.lookup(relative_path)? {
            Some(entry) => entry.content_hash != content_hash,
            None => true,
        })
    }

    /// Decide how to handle an item with the given content hash
    pub fn decide(&self, relative_path: &str, content_hash: &str) -> Result<Decision> {
        let Some(entry) = self.lookup(relative_path)? else {
            return Ok(Decision::Process(ProcessReason::New));
        };
        if entry.content_hash != content_hash {
            return Ok(Decision::Process(ProcessReason::Changed));
        }
        Ok(match entry.status {
            ProcessingStatus::Completed => Decision::Reuse(entry),
            ProcessingStatus::Skipped => Decision::Skip(entry),
            ProcessingStatus::Failed => Decision::Process(ProcessReason::Retry),
            ProcessingStatus::Pending | ProcessingStatus::Processing => {
                Decision::Process(ProcessReason::Interrupted)
            }
        })
    }

    /// Start (or restart) a cycle for this content
    ///
    /// A changed hash keeps the row and remembers the old hash; stale
    /// results and errors are cleared.
    pub fn mark_pending(&self, relative_path: &str, content_hash: &str) -> Result<LedgerEntry> {
        self.transition(relative_path, content_hash, |entry| {
            entry.status = ProcessingStatus::Pending;
            entry.error_detail = None;
            entry.processed_at = None;
        })
    }

    /// OCR is about to be invoked
    pub fn mark_processing(&self, relative_path: &str, content_hash: &str) -> Result<LedgerEntry> {
        self.transition(relative_path, content_hash, |entry| {
            entry.status = ProcessingStatus::Processing;
            entry.error_detail = None;
            entry.processed_at = None;
        })
    }

    /// Upsert a completed entry pointing at the stored OCR result
    pub fn record_success(
        &self,
        relative_path: &str,
        content_hash: &str,
        cached_result_location: impl Into<PathBuf>,
    ) -> Result<LedgerEntry> {
        let location = cached_result_location.into();
        self.transition(relative_path, content_hash, move |entry| {
            entry.status = ProcessingStatus::Completed;
            entry.cached_result_location = Some(location);
            entry.error_detail = None;
            entry.processed_at = Some(Utc::now());
        })
    }

    /// Upsert a failed entry; the cached result location is left unset
    pub fn record_failure(
        &self,
        relative_path: &str,
        content_hash: &str,
        error_detail: impl Into<String>,
    ) -> Result<LedgerEntry> {
        let detail = error_detail.into();
        self.transition(relative_path, content_hash, move |entry| {
            entry.status = ProcessingStatus::Failed;
            entry.cached_result_location = None;
            entry.error_detail = Some(detail);
            entry.processed_at = Some(Utc::now());
        })
    }

    /// Upsert a skipped entry (nothing to recognize)
    pub fn record_skipped(&self, relative_path: &str, content_hash: &str) -> Result<LedgerEntry> {
        self.transition(relative_path, content_hash, |entry| {
            entry.status = ProcessingStatus::Skipped;
            entry.cached_result_location = None;
            entry.error_detail = None;
            entry.processed_at = Some(Utc::now());
        })
    }

    /// All entries, optionally filtered by status, ordered by path
    pub fn all_entries(&self, filter_status: Option<ProcessingStatus>) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.store.list()?;
        if let Some(status) = filter_status {
            entries.retain(|e| e.status == status);
        }
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(entries)
    }

    /// Move every failed entry back to pending
    ///
    /// Idempotent: a second call finds nothing to move. Returns the number
    /// of entries requeued.
    pub fn requeue_failed(&self) -> Result<usize> {
        let failed = self.all_entries(Some(ProcessingStatus::Failed))?;
        for mut entry in failed.iter().cloned() {
            entry.status = ProcessingStatus::Pending;
            entry.error_detail = None;
            entry.processed_at = None;
            self.store.upsert(&entry)?;
        }
        if !failed.is_empty() {
            tracing::info!(count = failed.len(), "requeued failed entries");
        }
        Ok(failed.len())
    }

    /// Entry counts by status
    pub fn summary(&self) -> Result<LedgerSummary> {
        Ok(LedgerSummary::from_entries(&self.store.list()?))
    }

    /// Load (or create) the entry for this content, apply `update`, persist
    fn transition(
        &self,
        relative_path: &str,
        content_hash: &str,
        update: impl FnOnce(&mut LedgerEntry),
    ) -> Result<LedgerEntry> {
        let mut entry = match self.lookup(relative_path)? {
            Some(mut entry) => {
                if entry.content_hash != content_hash {
                    entry.previous_hash = Some(std::mem::replace(
                        &mut entry.content_hash,
                        content_hash.to_string(),
                    ));
                    entry.cached_result_location = None;
                }
                entry
            }
            None => LedgerEntry::new(relative_path, content_hash),
        };
        update(&mut entry);
        self.store.upsert(&entry)?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::store::MemoryLedgerStore;

    fn ledger() -> ContentLedger {
        ContentLedger::new(Arc::new(MemoryLedgerStore::new()))
    }

    #[test]
    fn test_needs_processing_unknown_path() {
        let ledger = ledger();
        assert!(ledger.needs_processing("a.png", "h1").unwrap());
        assert!(ledger.lookup("a.png").unwrap().is_none());
    }

    #[test]
    fn test_needs_processing_after_success() {
        let ledger = ledger();
        ledger.record_success("a.png", "h1", "/cache/a.png.json").unwrap();
        assert!(!ledger.needs_processing("a.png", "h1").unwrap());
        assert!(ledger.needs_processing("a.png", "h2").unwrap());
    }

    #[test]
    fn test_record_success_populates_location() {
        let ledger = ledger();
        let entry = ledger.record_success("a.png", "h1", "/cache/a.png.json").unwrap();
        assert_eq!(entry.status, ProcessingStatus::Completed);
        assert_eq!(
            entry.cached_result_location,
            Some(PathBuf::from("/cache/a.png.json"))
        );
        assert!(entry.processed_at.is_some());
        assert!(entry.error_detail.is_none());
    }

    #[test]
    fn test_record_failure_has_detail_and_no_location() {
        let ledger = ledger();
        ledger.record_success("a.png", "h1", "/cache/a.png.json").unwrap();
        let entry = ledger.record_failure("a.png", "h1", "quota exceeded").unwrap();
        assert_eq!(entry.status, ProcessingStatus::Failed);
        assert_eq!(entry.error_detail.as_deref(), Some("quota exceeded"));
        assert!(entry.cached_result_location.is_none());
        assert!(entry.processed_at.is_some());
    }

    #[test]
    fn test_upsert_never_duplicates() {
        let ledger = ledger();
        ledger.mark_pending("a.png", "h1").unwrap();
        ledger.mark_processing("a.png", "h1").unwrap();
        ledger.record_success("a.png", "h1", "/c").unwrap();
        ledger.mark_pending("a.png", "h2").unwrap();
        assert_eq!(ledger.all_entries(None).unwrap().len(), 1);
    }

    #[test]
    fn test_changed_hash_keeps_row_with_history() {
        let ledger = ledger();
        let first = ledger.record_success("a.png", "h1", "/c").unwrap();
        let entry = ledger.mark_pending("a.png", "h2").unwrap();
        assert_eq!(entry.status, ProcessingStatus::Pending);
        assert_eq!(entry.content_hash, "h2");
        assert_eq!(entry.previous_hash.as_deref(), Some("h1"));
        assert!(entry.cached_result_location.is_none());
        assert_eq!(entry.discovered_at, first.discovered_at);
    }

    #[test]
    fn test_decide() {
        let ledger = ledger();
        assert_eq!(
            ledger.decide("a.png", "h1").unwrap(),
            Decision::Process(ProcessReason::New)
        );

        ledger.mark_processing("a.png", "h1").unwrap();
        assert_eq!(
            ledger.decide("a.png", "h1").unwrap(),
            Decision::Process(ProcessReason::Interrupted)
        );

        ledger.record_success("a.png", "h1", "/c").unwrap();
        assert!(matches!(ledger.decide("a.png", "h1").unwrap(), Decision::Reuse(_)));
        assert_eq!(
            ledger.decide("a.png", "h2").unwrap(),
            Decision::Process(ProcessReason::Changed)
        );

        ledger.record_skipped("c.png", "h4").unwrap();
        assert!(matches!(ledger.decide("c.png", "h4").unwrap(), Decision::Skip(_)));
    }

    // LED-001: 失敗した項目は次回の実行で再処理される
    #[test]
    fn test_decide_retries_failed_entry() {
        let ledger = ledger();
        ledger.record_failure("b.png", "h3", "[quota] quota exceeded").unwrap();
        assert_eq!(
            ledger.decide("b.png", "h3").unwrap(),
            Decision::Process(ProcessReason::Retry)
        );
        assert!(!ledger.needs_processing("b.png", "h3").unwrap());
    }

    #[test]
    fn test_all_entries_filter() {
        let ledger = ledger();
        ledger.record_success("b.png", "1", "/c/b").unwrap();
        ledger.record_failure("a.png", "2", "err").unwrap();
        ledger.record_success("c.png", "3", "/c/c").unwrap();

        let completed = ledger.all_entries(Some(ProcessingStatus::Completed)).unwrap();
        let paths: Vec<_> = completed.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["b.png", "c.png"]);

        let failed = ledger.all_entries(Some(ProcessingStatus::Failed)).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(ledger.all_entries(None).unwrap().len(), 3);
    }

    #[test]
    fn test_requeue_failed_is_idempotent() {
        let ledger = ledger();
        ledger.record_failure("a.png", "1", "timeout").unwrap();
        ledger.record_failure("b.png", "2", "quota").unwrap();
        ledger.record_success("c.png", "3", "/c").unwrap();

        assert_eq!(ledger.requeue_failed().unwrap(), 2);
        assert_eq!(ledger.requeue_failed().unwrap(), 0);

        let pending = ledger.all_entries(Some(ProcessingStatus::Pending)).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|e| e.error_detail.is_none()));
        assert_eq!(
            ledger.decide("a.png", "1").unwrap(),
            Decision::Process(ProcessReason::Interrupted)
        );
    }

    #[test]
    fn test_summary() {
        let ledger = ledger();
        ledger.record_success("a", "1", "/c").unwrap();
        ledger.record_failure("b", "2", "x").unwrap();
        ledger.record_skipped("c", "3").unwrap();
        ledger.mark_pending("d", "4").unwrap();
        let summary = ledger.summary().unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.pending, 1);
    }
}
