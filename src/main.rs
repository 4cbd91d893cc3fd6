//! kanji-ledger - Incremental batch OCR for scanned Japanese pages
//!
//! CLI entry point

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use kanji_ledger::{
    exit_codes, print_summary, write_report, BatchProcessor, Cli, CliOverrides, Commands,
    CommandOcrEngine, Config, ConsoleProgress, ContentLedger, JsonLedgerStore, LedgerArgs,
    NoopProgress, OcrEngine, OcrError, OcrPage, OcrResultCache, OutputMode, PipelineError,
    PlannedAction, PlannedItem, ProcessArgs, ProcessingStage, ProgressCallback, StatusArgs,
};

fn main() {
    let cli = Cli::parse();

    let (verbose, quiet) = match &cli.command {
        Commands::Process(args) => (args.verbose, args.quiet),
        _ => (0, false),
    };
    init_tracing(verbose, quiet);

    let result = match cli.command {
        Commands::Process(args) => run_process(&args),
        Commands::Status(args) => run_status(&args).map(|()| exit_codes::SUCCESS),
        Commands::Requeue(args) => run_requeue(&args).map(|()| exit_codes::SUCCESS),
        Commands::Info => run_info().map(|()| exit_codes::SUCCESS),
    };

    std::process::exit(match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<PipelineError>() {
                Some(PipelineError::InputNotFound(_)) => exit_codes::INPUT_NOT_FOUND,
                _ => exit_codes::GENERAL_ERROR,
            }
        }
    });
}

/// `RUST_LOG` wins; otherwise warn, raised by `-v`/`-vv`
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ============ Config ============

/// Explicit `--config` must load; implicit lookup falls back to defaults
fn load_config(explicit: Option<&Path>, overrides: &CliOverrides) -> anyhow::Result<Config> {
    let config = match explicit {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable config file");
            Config::default()
        }),
    };
    Ok(config.merge_with_cli(overrides))
}

fn open_ledger(config: &Config) -> anyhow::Result<ContentLedger> {
    let store = JsonLedgerStore::open(&config.ledger_path)
        .with_context(|| format!("failed to open ledger {}", config.ledger_path.display()))?;
    Ok(ContentLedger::new(Arc::new(store)))
}

// ============ Process Command ============

/// Stands in for the OCR command during `--dry-run` when it is not installed
struct UnavailableEngine(String);

impl OcrEngine for UnavailableEngine {
    fn name(&self) -> &str {
        &self.0
    }

    fn recognize(&self, _image: &[u8]) -> kanji_ledger::ocr::Result<OcrPage> {
        Err(OcrError::CommandNotFound(self.0.clone()))
    }
}

fn run_process(args: &ProcessArgs) -> anyhow::Result<i32> {
    if !args.input.exists() {
        eprintln!("Error: Input path does not exist: {}", args.input.display());
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }

    let config = load_config(args.config.as_deref(), &args.overrides())?;
    let ledger = open_ledger(&config)?;
    let cache = OcrResultCache::new(&config.cache_dir)
        .with_context(|| format!("failed to open cache {}", config.cache_dir.display()))?;

    let engine: Box<dyn OcrEngine> = match CommandOcrEngine::new(config.ocr_options()) {
        Ok(engine) => Box::new(engine),
        Err(e) if args.dry_run => {
            tracing::warn!(error = %e, "OCR command unavailable");
            Box::new(UnavailableEngine(config.ocr.command.clone()))
        }
        Err(e) => return Err(e).context("cannot start OCR engine"),
    };
    let processor =
        BatchProcessor::with_options(ledger, cache, engine, config.pipeline_options());

    if args.dry_run {
        let plan = processor.plan(&args.input, &NoopProgress)?;
        print_execution_plan(args, &config, &plan);
        return Ok(exit_codes::SUCCESS);
    }

    let mode = if args.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::from_verbosity(args.verbose)
    };
    let progress = ConsoleProgress::new(mode);

    let report = processor.run(&args.input, &progress)?;
    if report.counts.total == 0 {
        tracing::warn!(input = %args.input.display(), "no supported images found");
    }

    progress.on_stage_start(ProcessingStage::Writing, 1);
    write_report(&report, &config.output, &Local::now())?;
    progress.on_stage_complete(
        ProcessingStage::Writing,
        &config.output.display().to_string(),
    );
    progress.on_stage_complete(
        ProcessingStage::Completed,
        &format!("{} image(s)", report.counts.total),
    );
    progress.finish();

    if !args.quiet {
        for failure in &report.failures {
            eprintln!("Failed: {}: {}", failure.relative_path, failure.detail);
        }
        print_summary(&report.counts, progress.elapsed_secs());
        println!("Output written to: {}", config.output.display());
    }

    Ok(if report.counts.has_failures() {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::SUCCESS
    })
}

/// Print execution plan for dry-run mode
fn print_execution_plan(args: &ProcessArgs, config: &Config, plan: &[PlannedItem]) {
    println!("=== Dry Run - Execution Plan ===");
    println!();
    println!("Input:  {}", args.input.display());
    println!("Output: {}", config.output.display());
    println!("Ledger: {}", config.ledger_path.display());
    println!("Cache:  {}", config.cache_dir.display());
    println!("OCR:    {}", config.ocr.command);
    println!("Images: {}", plan.len());
    let to_ocr = plan
        .iter()
        .filter(|item| matches!(item.action, PlannedAction::Recognize(_)))
        .count();
    println!("OCR calls needed: {}", to_ocr);
    println!();
    for (i, item) in plan.iter().enumerate() {
        println!("  {:>4}. {:<20} {}", i + 1, item.action.to_string(), item.image.relative_path);
    }
}

// ============ Ledger Commands ============

fn run_status(args: &StatusArgs) -> anyhow::Result<()> {
    let config = load_config(args.ledger.config.as_deref(), &args.ledger.overrides())?;
    let ledger = open_ledger(&config)?;

    for entry in ledger.all_entries(args.status)? {
        let hash = entry.content_hash.get(..12).unwrap_or(&entry.content_hash);
        match &entry.error_detail {
            Some(detail) => println!(
                "{:<10} {:<12} {}  {}",
                entry.status, hash, entry.relative_path, detail
            ),
            None => println!("{:<10} {:<12} {}", entry.status, hash, entry.relative_path),
        }
    }

    let summary = ledger.summary()?;
    println!();
    println!(
        "Total: {}  completed: {}  failed: {}  skipped: {}  pending: {}  processing: {}",
        summary.total,
        summary.completed,
        summary.failed,
        summary.skipped,
        summary.pending,
        summary.processing
    );
    Ok(())
}

fn run_requeue(args: &LedgerArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref(), &args.overrides())?;
    let ledger = open_ledger(&config)?;
    let count = ledger.requeue_failed()?;
    println!("Requeued {} failed image(s)", count);
    Ok(())
}

// ============ Info Command ============

fn run_info() -> anyhow::Result<()> {
    let config = load_config(None, &CliOverrides::new())?;

    println!("kanji-ledger v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("System Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);

    println!();
    println!("OCR Command:");
    match which::which(&config.ocr.command) {
        Ok(path) => println!("  {}: {} (found)", config.ocr.command, path.display()),
        Err(_) => println!("  {}: Not found", config.ocr.command),
    }
    match &config.ocr.credentials {
        Some(path) => println!("  Credentials: {}", path.display()),
        None => match std::env::var_os(kanji_ledger::ocr::CREDENTIALS_ENV) {
            Some(value) => println!(
                "  Credentials: {} (from {})",
                Path::new(&value).display(),
                kanji_ledger::ocr::CREDENTIALS_ENV
            ),
            None => println!("  Credentials: not configured"),
        },
    }

    println!();
    println!("Storage:");
    println!("  Output: {}", config.output.display());
    println!("  Ledger: {}", config.ledger_path.display());
    println!("  Cache:  {}", config.cache_dir.display());

    println!();
    println!("Config File Locations:");
    for path in Config::search_paths() {
        let marker = if path.is_file() { " (active)" } else { "" };
        println!("  {}{}", path.display(), marker);
    }

    Ok(())
}
