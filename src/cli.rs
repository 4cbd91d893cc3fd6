//! CLI argument definitions

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CliOverrides;
use crate::ledger::ProcessingStatus;

/// Incremental OCR for scanned Japanese pages
#[derive(Debug, Parser)]
#[command(name = "kanji-ledger", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// OCR every new or changed image under a folder and write the transcript
    Process(ProcessArgs),
    /// Show ledger entries and counts
    Status(StatusArgs),
    /// Move failed ledger entries back to pending
    Requeue(LedgerArgs),
    /// Show tool availability and config locations
    Info,
}

/// Arguments for `process`
#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Folder containing page images
    pub input: PathBuf,

    /// Transcript output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// OCR service credentials file
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ledger file
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// OCR result cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Show what would be done without calling OCR or touching the ledger
    #[arg(long)]
    pub dry_run: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress and summary output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl ProcessArgs {
    /// Values the user passed explicitly
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            output: self.output.clone(),
            ledger_path: self.ledger.clone(),
            cache_dir: self.cache_dir.clone(),
            credentials: self.credentials.clone(),
            ocr_command: None,
        }
    }
}

/// Ledger location shared by the ledger subcommands
#[derive(Debug, Args)]
pub struct LedgerArgs {
    /// Ledger file (defaults to the configured one)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl LedgerArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            ledger_path: self.ledger.clone(),
            ..CliOverrides::default()
        }
    }
}

/// Arguments for `status`
#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub ledger: LedgerArgs,

    /// Only list entries with this status
    #[arg(long, value_parser = parse_status)]
    pub status: Option<ProcessingStatus>,
}

fn parse_status(value: &str) -> Result<ProcessingStatus, String> {
    value.parse()
}
