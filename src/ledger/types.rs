//! Common types for the ledger module

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

// ============================================================
// Error Types
// ============================================================

/// Ledger store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================
// Status
// ============================================================

/// Processing status of a ledger entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Discovered, waiting for OCR
    #[default]
    Pending,
    /// OCR in flight
    Processing,
    /// OCR result stored
    Completed,
    /// OCR or IO failed
    Failed,
    /// Nothing to recognize
    Skipped,
}

impl ProcessingStatus {
    pub const ALL: [ProcessingStatus; 5] = [
        ProcessingStatus::Pending,
        ProcessingStatus::Processing,
        ProcessingStatus::Completed,
        ProcessingStatus::Failed,
        ProcessingStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ProcessingStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown status: {}", s))
    }
}

// ============================================================
// Entry
// ============================================================

/// One record per discovered input item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Identity within the input root (`/` separated)
    pub relative_path: String,
    /// SHA-256 of the file bytes, lower hex
    pub content_hash: String,
    /// Stored OCR output for this item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_result_location: Option<PathBuf>,
    pub status: ProcessingStatus,
    /// Set only when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Set on terminal states
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Hash of the previous content cycle, if the file changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// New pending entry
    pub fn new(relative_path: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content_hash: content_hash.into(),
            cached_result_location: None,
            status: ProcessingStatus::Pending,
            error_detail: None,
            processed_at: None,
            previous_hash: None,
            discovered_at: Utc::now(),
        }
    }
}

/// Entry counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl LedgerSummary {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            summary.total += 1;
            match entry.status {
                ProcessingStatus::Pending => summary.pending += 1,
                ProcessingStatus::Processing => summary.processing += 1,
                ProcessingStatus::Completed => summary.completed += 1,
                ProcessingStatus::Failed => summary.failed += 1,
                ProcessingStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

// ============================================================
// Tests
// ============================================================
