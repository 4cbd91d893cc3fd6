//! kanji-ledger - Incremental batch OCR for scanned Japanese pages
//!
//! Recognizes text in page images through an external OCR engine, remembers
//! every image by content hash so unchanged pages are never sent twice, and
//! renders a transcript that separates furigana from running text and marks
//! low-confidence characters.
//!
//! # Modules
//!
//! - [`ledger`] - content-addressed processing ledger
//! - [`ocr`] - OCR data model, Vision-style boundary, engine, result cache
//! - [`script`] - hiragana / katakana / kanji predicates
//! - [`confidence`] - confidence buckets and markers
//! - [`furigana`] - furigana classification
//! - [`transcript`] - report rendering
//! - [`pipeline`] - the batch run
//!
//! # Example
//!
//! ```rust,no_run
//! use kanji_ledger::{
//!     BatchProcessor, CommandOcrEngine, CommandOcrOptions, ContentLedger, JsonLedgerStore,
//!     NoopProgress, OcrResultCache,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let ledger = ContentLedger::new(Arc::new(JsonLedgerStore::open("result/ledger.json").unwrap()));
//! let cache = OcrResultCache::new("result/ocr_cache").unwrap();
//! let engine = CommandOcrEngine::new(CommandOcrOptions::new("vision-ocr")).unwrap();
//!
//! let processor = BatchProcessor::new(ledger, cache, engine);
//! let report = processor.run(Path::new("scans"), &NoopProgress).unwrap();
//! println!("{} sections", report.sections.len());
//! ```

pub mod cli;
pub mod confidence;
pub mod config;
pub mod furigana;
pub mod ledger;
pub mod ocr;
pub mod pipeline;
pub mod progress;
pub mod script;
pub mod transcript;

// Re-export public API
pub use cli::{Cli, Commands, LedgerArgs, ProcessArgs, StatusArgs};
pub use confidence::ConfidenceBucket;
pub use config::{CliOverrides, Config, ConfigError};
pub use furigana::{ClassifiedParagraph, FuriganaClassifier, FuriganaOptions, ParagraphKind};
pub use ledger::{
    ContentLedger, Decision, JsonLedgerStore, LedgerEntry, LedgerStore, LedgerSummary,
    MemoryLedgerStore, ProcessReason, ProcessingStatus, StoreError,
};
pub use ocr::{
    CacheError, CommandOcrEngine, CommandOcrOptions, OcrEngine, OcrError, OcrPage,
    OcrResultCache, TextParagraph, TextSymbol, TextWord,
};
pub use pipeline::{
    discover_images, write_report, BatchProcessor, BatchReport, DiscoveredImage, ItemError,
    ItemFailure, PipelineError, PipelineOptions, PlannedAction, PlannedItem,
};
pub use progress::{
    print_summary, ConsoleProgress, NoopProgress, OutputMode, ProcessingStage, ProgressCallback,
    RunCounts,
};
pub use transcript::ImageTranscript;

/// Process exit codes
pub mod exit_codes {
    /// Run finished without failures
    pub const SUCCESS: i32 = 0;
    /// Unexpected error (config, ledger, IO)
    pub const GENERAL_ERROR: i32 = 1;
    /// Input folder missing
    pub const INPUT_NOT_FOUND: i32 = 2;
    /// Report written, but some images failed
    pub const PARTIAL_FAILURE: i32 = 3;
}
