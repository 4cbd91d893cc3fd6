//! Progress tracking for batch OCR runs.
//!
//! The pipeline reports through [`ProgressCallback`]; the CLI draws an
//! `indicatif` bar via [`ConsoleProgress`] and prints the final summary.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt;
use std::time::Instant;

/// Processing stages of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingStage {
    /// Walking the input tree
    #[default]
    Discovering,
    /// Fingerprinting file contents
    Hashing,
    /// Calling the OCR engine or reloading cached results
    Recognizing,
    /// Furigana and confidence classification
    Analyzing,
    /// Writing the transcript
    Writing,
    /// Completed
    Completed,
}

impl ProcessingStage {
    /// Get the English name of the stage
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingStage::Discovering => "Discovering",
            ProcessingStage::Hashing => "Hashing",
            ProcessingStage::Recognizing => "Recognizing",
            ProcessingStage::Analyzing => "Analyzing",
            ProcessingStage::Writing => "Writing",
            ProcessingStage::Completed => "Completed",
        }
    }

    /// Get the Japanese description of the stage
    pub fn description_ja(&self) -> &'static str {
        match self {
            ProcessingStage::Discovering => "画像検索中",
            ProcessingStage::Hashing => "ハッシュ計算中",
            ProcessingStage::Recognizing => "文字認識中",
            ProcessingStage::Analyzing => "ふりがな解析中",
            ProcessingStage::Writing => "結果出力中",
            ProcessingStage::Completed => "完了",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.description_ja())
    }
}

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// No output
    Quiet,
    /// Progress bar and summary
    #[default]
    Normal,
    /// Per-item outcome lines
    Verbose,
    /// Everything, including debug messages
    VeryVerbose,
}

impl OutputMode {
    /// Create OutputMode from verbosity level
    pub fn from_verbosity(level: u8) -> Self {
        match level {
            0 => OutputMode::Normal,
            1 => OutputMode::Verbose,
            _ => OutputMode::VeryVerbose,
        }
    }

    /// Check if output should be shown at this mode
    pub fn should_show(&self, required: OutputMode) -> bool {
        use OutputMode::*;
        match (self, required) {
            (Quiet, _) => false,
            (Normal, Quiet | Normal) => true,
            (Verbose, Quiet | Normal | Verbose) => true,
            (VeryVerbose, _) => true,
            _ => false,
        }
    }
}

/// Pipeline progress observer
///
/// All methods default to doing nothing.
pub trait ProgressCallback {
    /// A stage starts with `total` items (0 when unknown)
    fn on_stage_start(&self, _stage: ProcessingStage, _total: usize) {}

    /// Item `current` (1-based) of the running stage
    fn on_item_progress(&self, _current: usize, _total: usize, _item: &str) {}

    /// An item finished with a short outcome (`ocr`, `reused`, `failed`, ...)
    fn on_item_complete(&self, _item: &str, _outcome: &str) {}

    /// A stage finished
    fn on_stage_complete(&self, _stage: ProcessingStage, _message: &str) {}

    /// Per-item detail, shown at the highest verbosity
    fn on_debug(&self, _message: &str) {}
}

/// Progress callback that reports nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {}

/// Console progress: one `indicatif` bar shared by every stage
pub struct ConsoleProgress {
    bar: ProgressBar,
    mode: OutputMode,
    started: Instant,
}

impl ConsoleProgress {
    pub fn new(mode: OutputMode) -> Self {
        let bar = if mode.should_show(OutputMode::Normal) {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template("{prefix:.cyan} [{bar:40}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            mode,
            started: Instant::now(),
        }
    }

    /// Get elapsed time in seconds
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Clear the bar before printing the summary
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_stage_start(&self, stage: ProcessingStage, total: usize) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_message("");
    }

    fn on_item_progress(&self, current: usize, _total: usize, item: &str) {
        self.bar.set_position(current as u64);
        self.bar.set_message(item.to_string());
    }

    fn on_item_complete(&self, item: &str, outcome: &str) {
        if self.mode.should_show(OutputMode::Verbose) {
            self.bar.println(format!("  {outcome:>8}  {item}"));
        }
    }

    fn on_stage_complete(&self, stage: ProcessingStage, message: &str) {
        if self.mode.should_show(OutputMode::Verbose) {
            self.bar.println(format!("  {}: {}", stage, message));
        }
    }

    fn on_debug(&self, message: &str) {
        if self.mode.should_show(OutputMode::VeryVerbose) {
            self.bar.println(format!("    [DEBUG] {}", message));
        }
    }
}

/// Item counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub total: usize,
    /// Recognized by the OCR engine this run
    pub completed: usize,
    /// Reloaded from the result cache
    pub reused: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunCounts {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Print final summary
pub fn print_summary(counts: &RunCounts, elapsed_secs: f64) {
    println!();
    println!("{}", "=".repeat(60));
    println!("Processing Summary");
    println!("{}", "=".repeat(60));
    println!("  Total images: {}", counts.total);
    println!("  Recognized:   {}", counts.completed);
    println!("  Reused:       {}", counts.reused);
    println!("  Skipped:      {}", counts.skipped);
    println!("  Failed:       {}", counts.failed);
    println!("  Elapsed:      {:.2}s", elapsed_secs);
    println!("{}", "=".repeat(60));
    println!();
}
