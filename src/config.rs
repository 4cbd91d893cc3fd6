//! Configuration file support
//!
//! TOML configuration with the lookup order:
//! 1. `--config <path>`
//! 2. `./kanji-ledger.toml`
//! 3. `<config_dir>/kanji-ledger/config.toml`
//! 4. built-in defaults
//!
//! Values passed on the command line always win over file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::furigana::{FuriganaOptions, DEFAULT_MAX_WORD_SYMBOLS, DEFAULT_SIZE_RATIO};
use crate::ocr::CommandOcrOptions;
use crate::pipeline::{PipelineOptions, DEFAULT_EXTENSIONS};

/// Local config file name
pub const LOCAL_CONFIG_FILE: &str = "kanji-ledger.toml";

/// Directory under the user config dir
pub const APP_CONFIG_DIR: &str = "kanji-ledger";

/// Default OCR command
pub const DEFAULT_OCR_COMMAND: &str = "vision-ocr";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// OCR command settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Program printing a Vision-style JSON response for the image path it is given
    pub command: String,
    /// Arguments placed before the image path
    pub args: Vec<String>,
    /// Service account file exported as `GOOGLE_APPLICATION_CREDENTIALS`
    pub credentials: Option<PathBuf>,
    /// Per-image timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_OCR_COMMAND.to_string(),
            args: Vec::new(),
            credentials: None,
            timeout_secs: Some(120),
        }
    }
}

/// Furigana detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuriganaConfig {
    pub size_ratio: f64,
    pub max_word_symbols: usize,
}

impl Default for FuriganaConfig {
    fn default() -> Self {
        Self {
            size_ratio: DEFAULT_SIZE_RATIO,
            max_word_symbols: DEFAULT_MAX_WORD_SYMBOLS,
        }
    }
}

/// Full configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transcript output path
    pub output: PathBuf,
    /// Ledger file
    pub ledger_path: PathBuf,
    /// OCR result cache directory
    pub cache_dir: PathBuf,
    /// Image extensions to pick up
    pub extensions: Vec<String>,
    pub ocr: OcrConfig,
    pub furigana: FuriganaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from("result/ocr_output.txt"),
            ledger_path: PathBuf::from("result/ledger.json"),
            cache_dir: PathBuf::from("result/ocr_cache"),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            ocr: OcrConfig::default(),
            furigana: FuriganaConfig::default(),
        }
    }
}

impl Config {
    /// Search the default locations; defaults when none exists
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// First existing config file in lookup order
    pub fn find_config_file() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.is_file())
    }

    /// Candidate config file locations
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_CONFIG_DIR).join("config.toml"));
        }
        paths
    }

    /// Load and validate a specific file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.furigana.size_ratio > 0.0 && self.furigana.size_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "furigana.size_ratio must be in (0, 1], got {}",
                self.furigana.size_ratio
            )));
        }
        if self.furigana.max_word_symbols == 0 {
            return Err(ConfigError::Invalid(
                "furigana.max_word_symbols must be greater than 0".into(),
            ));
        }
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::Invalid("extensions must not be empty".into()));
        }
        if self.ocr.command.trim().is_empty() {
            return Err(ConfigError::Invalid("ocr.command must not be empty".into()));
        }
        Ok(())
    }

    /// Apply command-line overrides (CLI wins)
    #[must_use]
    pub fn merge_with_cli(mut self, cli: &CliOverrides) -> Self {
        if let Some(output) = &cli.output {
            self.output = output.clone();
        }
        if let Some(ledger_path) = &cli.ledger_path {
            self.ledger_path = ledger_path.clone();
        }
        if let Some(cache_dir) = &cli.cache_dir {
            self.cache_dir = cache_dir.clone();
        }
        if let Some(credentials) = &cli.credentials {
            self.ocr.credentials = Some(credentials.clone());
        }
        if let Some(command) = &cli.ocr_command {
            self.ocr.command = command.clone();
        }
        self
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::default()
            .with_extensions(&self.extensions)
            .with_furigana(
                FuriganaOptions::default()
                    .with_size_ratio(self.furigana.size_ratio)
                    .with_max_word_symbols(self.furigana.max_word_symbols),
            )
    }

    pub fn ocr_options(&self) -> CommandOcrOptions {
        CommandOcrOptions::new(self.ocr.command.clone())
            .with_args(self.ocr.args.clone())
            .with_credentials(self.ocr.credentials.clone())
            .with_timeout(self.ocr.timeout_secs)
    }
}

/// Values explicitly passed on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output: Option<PathBuf>,
    pub ledger_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
    pub ocr_command: Option<String>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }
}
