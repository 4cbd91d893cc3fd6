//! Incremental processing ledger
//!
//! Tracks every discovered input by relative path and content fingerprint
//! so unchanged files never reach the OCR engine twice.
//!
//! # Features
//!
//! - **Fingerprints** - streamed SHA-256 of the raw file bytes
//! - **Stores** ([`LedgerStore`]) - in-memory for tests, JSON file for runs;
//!   corrupt records are reported and treated as absent
//! - **Ledger** ([`ContentLedger`]) - change detection, status lifecycle,
//!   and [`ContentLedger::requeue_failed`] for resetting failed items
//!
//! # Example
//!
//! ```rust,no_run
//! use kanji_ledger::{ContentLedger, JsonLedgerStore, ProcessingStatus};
//! use std::sync::Arc;
//!
//! let store = JsonLedgerStore::open("result/ledger.json").unwrap();
//! let ledger = ContentLedger::new(Arc::new(store));
//! for entry in ledger.all_entries(Some(ProcessingStatus::Failed)).unwrap() {
//!     println!("{}: {:?}", entry.relative_path, entry.error_detail);
//! }
//! ```

mod content;
mod fingerprint;
mod store;
mod types;

// Re-export public API
pub use content::{ContentLedger, Decision, ProcessReason};
pub use fingerprint::{hash_bytes, hash_file};
pub use store::{JsonLedgerStore, LedgerStore, MemoryLedgerStore};
pub use types::{LedgerEntry, LedgerSummary, ProcessingStatus, Result, StoreError};
