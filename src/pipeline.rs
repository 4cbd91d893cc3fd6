//! Batch OCR pipeline
//!
//! Strictly sequential: discover, hash, consult the ledger, recognize or
//! reload, classify, render. Per-item failures are recorded in the ledger
//! and never abort the batch. Only a missing input root or a ledger that
//! cannot be written stops a run.

use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::furigana::{FuriganaClassifier, FuriganaOptions};
use crate::ledger::{
    hash_bytes, hash_file, ContentLedger, Decision, ProcessReason, StoreError,
};
use crate::ocr::{CacheError, OcrEngine, OcrError, OcrPage, OcrResultCache};
use crate::progress::{ProcessingStage, ProgressCallback, RunCounts};
use crate::transcript::{self, ImageTranscript};

/// Default image extensions (lowercase, without dot)
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

// ============================================================
// Error Types
// ============================================================

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input path not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Ledger error: {0}")]
    Ledger(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors confined to a single image
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Service(#[from] OcrError),

    #[error("{0}")]
    Cache(#[from] CacheError),
}

impl ItemError {
    pub fn category(&self) -> FailureCategory {
        match self {
            ItemError::Io(_) | ItemError::Cache(_) => FailureCategory::FileAccess,
            ItemError::Service(OcrError::Timeout(_)) => FailureCategory::Network,
            ItemError::Service(e) => FailureCategory::from_message(&e.to_string()),
        }
    }

    /// Ledger `error_detail`: category prefix plus message
    pub fn detail(&self) -> String {
        format!("[{}] {}", self.category(), self)
    }
}

/// Coarse failure classes shown in `error_detail`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Quota,
    Network,
    FileAccess,
    Recognition,
}

impl FailureCategory {
    /// Categorize a collaborator message by keyword
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if has(&["quota", "limit"]) {
            FailureCategory::Quota
        } else if has(&["network", "connection", "timeout", "timed out"]) {
            FailureCategory::Network
        } else if has(&["permission", "access"]) {
            FailureCategory::FileAccess
        } else {
            FailureCategory::Recognition
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Quota => "quota",
            FailureCategory::Network => "network",
            FailureCategory::FileAccess => "file_access",
            FailureCategory::Recognition => "recognition",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// Options
// ============================================================

/// Pipeline options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Accepted extensions, lowercase without dot
    pub extensions: Vec<String>,
    pub furigana: FuriganaOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            furigana: FuriganaOptions::default(),
        }
    }
}

impl PipelineOptions {
    /// Set accepted extensions; case and a leading dot are ignored
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_furigana(mut self, furigana: FuriganaOptions) -> Self {
        self.furigana = furigana;
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

// ============================================================
// Discovery
// ============================================================

/// An image found under the input root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredImage {
    pub path: PathBuf,
    /// `/`-separated path relative to the input root
    pub relative_path: String,
}

/// Depth-first listing: files of a directory (sorted) before its subdirectories (sorted)
pub fn discover_images(root: &Path, options: &PipelineOptions) -> Result<Vec<DiscoveredImage>> {
    if !root.exists() {
        return Err(PipelineError::InputNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(PipelineError::NotADirectory(root.to_path_buf()));
    }

    let mut images = Vec::new();
    let entries = read_sorted(root)?;
    walk(root, entries, options, &mut images);
    tracing::info!(root = %root.display(), count = images.len(), "discovered images");
    Ok(images)
}

fn read_sorted(dir: &Path) -> std::io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            dirs.push(path);
        } else if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    dirs.sort();
    Ok((files, dirs))
}

fn walk(
    root: &Path,
    (files, dirs): (Vec<PathBuf>, Vec<PathBuf>),
    options: &PipelineOptions,
    out: &mut Vec<DiscoveredImage>,
) {
    for path in files.into_iter().filter(|p| options.accepts(p)) {
        out.push(DiscoveredImage {
            relative_path: relative_key(root, &path),
            path,
        });
    }
    for dir in dirs {
        match read_sorted(&dir) {
            Ok(entries) => walk(root, entries, options, out),
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory"),
        }
    }
}

fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================
// Planning
// ============================================================

/// What a run will do with one image
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    /// Send to the OCR engine
    Recognize(ProcessReason),
    /// Reload the stored OCR result
    Reuse { cached_result_location: Option<PathBuf> },
    /// Unchanged and skipped by an earlier run
    Hold,
    /// Zero-byte file
    Empty,
    /// Could not be read for hashing
    Unreadable(String),
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedAction::Recognize(reason) => write!(f, "ocr ({})", reason.as_str()),
            PlannedAction::Reuse { .. } => f.write_str("reuse"),
            PlannedAction::Hold => f.write_str("hold (skipped)"),
            PlannedAction::Empty => f.write_str("skip (empty)"),
            PlannedAction::Unreadable(e) => write!(f, "unreadable: {}", e),
        }
    }
}

/// One discovered image with its fingerprint and planned action
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedItem {
    pub image: DiscoveredImage,
    /// `None` when the file could not be read
    pub content_hash: Option<String>,
    pub action: PlannedAction,
}

// ============================================================
// Results
// ============================================================

/// A per-item failure recorded during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub relative_path: String,
    pub detail: String,
}

/// Outcome of a run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Transcripts ordered by file name, then relative path
    pub sections: Vec<ImageTranscript>,
    pub counts: RunCounts,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    /// Full report text
    pub fn render(&self, generated_at: &DateTime<Local>) -> String {
        transcript::render_report(&self.sections, generated_at)
    }
}

/// Write the rendered report atomically
pub fn write_report(
    report: &BatchReport,
    output: &Path,
    generated_at: &DateTime<Local>,
) -> Result<()> {
    crate::ocr::write_atomic(output, report.render(generated_at).as_bytes())?;
    tracing::info!(output = %output.display(), sections = report.sections.len(), "wrote report");
    Ok(())
}

// ============================================================
// Processor
// ============================================================

/// Sequential batch processor over a ledger, a result cache and an OCR engine
pub struct BatchProcessor<E: OcrEngine> {
    ledger: ContentLedger,
    cache: OcrResultCache,
    engine: E,
    classifier: FuriganaClassifier,
    options: PipelineOptions,
}

impl<E: OcrEngine> BatchProcessor<E> {
    pub fn new(ledger: ContentLedger, cache: OcrResultCache, engine: E) -> Self {
        Self::with_options(ledger, cache, engine, PipelineOptions::default())
    }

    pub fn with_options(
        ledger: ContentLedger,
        cache: OcrResultCache,
        engine: E,
        options: PipelineOptions,
    ) -> Self {
        let classifier = FuriganaClassifier::with_options(options.furigana.clone());
        Self {
            ledger,
            cache,
            engine,
            classifier,
            options,
        }
    }

    /// Discover and fingerprint without touching the ledger or the engine
    pub fn plan(&self, root: &Path, progress: &dyn ProgressCallback) -> Result<Vec<PlannedItem>> {
        progress.on_stage_start(ProcessingStage::Discovering, 0);
        let images = discover_images(root, &self.options)?;
        progress.on_stage_complete(
            ProcessingStage::Discovering,
            &format!("{} images", images.len()),
        );

        let total = images.len();
        progress.on_stage_start(ProcessingStage::Hashing, total);
        let mut planned = Vec::with_capacity(total);
        for (idx, image) in images.into_iter().enumerate() {
            progress.on_item_progress(idx + 1, total, &image.relative_path);
            planned.push(self.plan_item(image)?);
        }
        progress.on_stage_complete(ProcessingStage::Hashing, &format!("{} hashed", total));
        Ok(planned)
    }

    fn plan_item(&self, image: DiscoveredImage) -> Result<PlannedItem> {
        let fingerprint = std::fs::metadata(&image.path)
            .and_then(|meta| Ok((meta.len(), hash_file(&image.path)?)));
        let (size, hash) = match fingerprint {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %image.relative_path, error = %e, "cannot read image");
                return Ok(PlannedItem {
                    image,
                    content_hash: None,
                    action: PlannedAction::Unreadable(e.to_string()),
                });
            }
        };

        let action = match self.ledger.decide(&image.relative_path, &hash)? {
            Decision::Process(_) if size == 0 => PlannedAction::Empty,
            Decision::Process(reason) => PlannedAction::Recognize(reason),
            Decision::Reuse(entry) => PlannedAction::Reuse {
                cached_result_location: entry.cached_result_location,
            },
            Decision::Skip(_) => PlannedAction::Hold,
        };
        tracing::debug!(path = %image.relative_path, %action, "planned");

        Ok(PlannedItem {
            image,
            content_hash: Some(hash),
            action,
        })
    }

    /// Run the batch and return the transcript sections with counts
    pub fn run(&self, root: &Path, progress: &dyn ProgressCallback) -> Result<BatchReport> {
        let planned = self.plan(root, progress)?;
        let mut report = BatchReport {
            counts: RunCounts {
                total: planned.len(),
                ..RunCounts::default()
            },
            ..BatchReport::default()
        };

        for item in &planned {
            if let (PlannedAction::Recognize(_), Some(hash)) = (&item.action, &item.content_hash) {
                self.ledger.mark_pending(&item.image.relative_path, hash)?;
            }
        }

        let total = planned.len();
        progress.on_stage_start(ProcessingStage::Recognizing, total);
        let mut pages: Vec<(String, OcrPage)> = Vec::new();
        for (idx, item) in planned.into_iter().enumerate() {
            let rel = item.image.relative_path.clone();
            progress.on_item_progress(idx + 1, total, &rel);
            progress.on_debug(&format!("{}: {}", rel, item.action));
            let outcome = self.execute(item, &mut report)?;
            progress.on_item_complete(&rel, outcome.label());
            if let Outcome::Page(page) = outcome {
                pages.push((rel, page));
            }
        }
        progress.on_stage_complete(
            ProcessingStage::Recognizing,
            &format!(
                "{} recognized, {} reused, {} failed",
                report.counts.completed, report.counts.reused, report.counts.failed
            ),
        );

        progress.on_stage_start(ProcessingStage::Analyzing, pages.len());
        let page_total = pages.len();
        for (idx, (rel, page)) in pages.into_iter().enumerate() {
            progress.on_item_progress(idx + 1, page_total, &rel);
            let classified = self.classifier.classify(page);
            report.sections.push(ImageTranscript::new(rel, &classified));
        }
        report.sections.sort_by(|a, b| {
            a.filename
                .cmp(&b.filename)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
        progress.on_stage_complete(
            ProcessingStage::Analyzing,
            &format!("{} sections", report.sections.len()),
        );

        tracing::info!(
            total = report.counts.total,
            completed = report.counts.completed,
            reused = report.counts.reused,
            skipped = report.counts.skipped,
            failed = report.counts.failed,
            "batch finished"
        );
        Ok(report)
    }

    fn execute(&self, item: PlannedItem, report: &mut BatchReport) -> Result<Outcome> {
        let rel = item.image.relative_path.as_str();
        let hash = item.content_hash.as_deref().unwrap_or_default();

        let reason = match item.action {
            PlannedAction::Unreadable(message) => {
                let detail = format!("[{}] {}", FailureCategory::FileAccess, message);
                self.ledger.record_failure(rel, hash, detail.clone())?;
                return Ok(self.fail(report, rel, detail));
            }
            PlannedAction::Hold => {
                report.counts.skipped += 1;
                return Ok(Outcome::Held);
            }
            PlannedAction::Empty => {
                self.ledger.record_skipped(rel, hash)?;
                report.counts.skipped += 1;
                return Ok(Outcome::Empty);
            }
            PlannedAction::Reuse {
                cached_result_location,
            } => match self.reload(rel, cached_result_location) {
                Ok(page) => {
                    report.counts.reused += 1;
                    return Ok(Outcome::Page(page));
                }
                Err(e) => {
                    tracing::warn!(path = rel, error = %e, "cached OCR result unusable, reprocessing");
                    ProcessReason::CacheMiss
                }
            },
            PlannedAction::Recognize(reason) => reason,
        };

        tracing::debug!(path = rel, reason = reason.as_str(), engine = self.engine.name(), "recognizing");
        self.ledger.mark_processing(rel, hash)?;
        match self.recognize(&item.image, hash) {
            Ok((hash, location, page)) => {
                self.ledger.record_success(rel, &hash, location)?;
                report.counts.completed += 1;
                Ok(Outcome::Page(page))
            }
            Err((hash, e)) => {
                let detail = e.detail();
                tracing::warn!(path = rel, error = %detail, "recognition failed");
                self.ledger.record_failure(rel, &hash, detail.clone())?;
                Ok(self.fail(report, rel, detail))
            }
        }
    }

    fn fail(&self, report: &mut BatchReport, rel: &str, detail: String) -> Outcome {
        report.counts.failed += 1;
        report.failures.push(ItemFailure {
            relative_path: rel.to_string(),
            detail,
        });
        Outcome::Failed
    }

    fn reload(&self, rel: &str, location: Option<PathBuf>) -> std::result::Result<OcrPage, CacheError> {
        let path = match location {
            Some(path) => path,
            None => self.cache.path_for(rel)?,
        };
        OcrResultCache::load_from(&path)
    }

    /// Read, recognize and store one image; returns the hash of the bytes actually sent
    fn recognize(
        &self,
        image: &DiscoveredImage,
        planned_hash: &str,
    ) -> std::result::Result<(String, PathBuf, OcrPage), (String, ItemError)> {
        let bytes = std::fs::read(&image.path)
            .map_err(|e| (planned_hash.to_string(), ItemError::from(e)))?;
        let hash = hash_bytes(&bytes);
        if hash != planned_hash {
            tracing::debug!(path = %image.relative_path, "content changed since hashing");
        }
        let page = self
            .engine
            .recognize(&bytes)
            .map_err(|e| (hash.clone(), ItemError::from(e)))?;
        let location = self
            .cache
            .store(&image.relative_path, &page)
            .map_err(|e| (hash.clone(), ItemError::from(e)))?;
        Ok((hash, location, page))
    }
}

/// Per-item result of the recognition stage
enum Outcome {
    Page(OcrPage),
    Held,
    Empty,
    Failed,
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Page(_) => "ok",
            Outcome::Held => "held",
            Outcome::Empty => "empty",
            Outcome::Failed => "failed",
        }
    }
}
