//! OCR engine abstraction
//!
//! The recognizer itself is an external collaborator. The pipeline only
//! needs something that turns raw image bytes into an [`OcrPage`] or an
//! error; [`CommandOcrEngine`] does that by running a configured program
//! that prints a Vision-style JSON response on stdout.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::types::{OcrError, OcrPage, Result};
use super::vision;

/// Environment variable passed to the OCR command when credentials are set
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Poll interval while waiting for the OCR command
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Text recognizer
pub trait OcrEngine {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Recognize text in raw image bytes
    fn recognize(&self, image: &[u8]) -> Result<OcrPage>;
}

impl<T: OcrEngine + ?Sized> OcrEngine for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(&self, image: &[u8]) -> Result<OcrPage> {
        (**self).recognize(image)
    }
}

impl<T: OcrEngine + ?Sized> OcrEngine for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(&self, image: &[u8]) -> Result<OcrPage> {
        (**self).recognize(image)
    }
}

/// Options for [`CommandOcrEngine`]
#[derive(Debug, Clone, Default)]
pub struct CommandOcrOptions {
    /// Program to run
    pub program: String,
    /// Arguments placed before the image path
    pub args: Vec<String>,
    /// Credentials file exported to the program
    pub credentials: Option<PathBuf>,
    /// Kill the program after this many seconds
    pub timeout_secs: Option<u64>,
}

impl CommandOcrOptions {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<PathBuf>) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Runs an external OCR program per image
///
/// The image bytes are written to a temporary file whose path is appended
/// to the configured arguments.
#[derive(Debug, Clone)]
pub struct CommandOcrEngine {
    options: CommandOcrOptions,
    program: PathBuf,
}

impl CommandOcrEngine {
    /// Resolve the program on `PATH` and build the engine
    pub fn new(options: CommandOcrOptions) -> Result<Self> {
        let program = which::which(&options.program)
            .map_err(|_| OcrError::CommandNotFound(options.program.clone()))?;
        Ok(Self { options, program })
    }

    fn run(&self, image_path: &std::path::Path) -> Result<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.options.args)
            .arg(image_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(credentials) = &self.options.credentials {
            command.env(CREDENTIALS_ENV, credentials);
        }

        let mut child = command.spawn()?;

        // Pipes are drained on helper threads while the child runs
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let stdout_reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(out) = stdout.as_mut() {
                let _ = out.read_to_end(&mut buf);
            }
            buf
        });
        let stderr_reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(err) = stderr.as_mut() {
                let _ = err.read_to_end(&mut buf);
            }
            buf
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(limit) = self.options.timeout_secs {
                if started.elapsed() >= Duration::from_secs(limit) {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(OcrError::Timeout(limit));
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            let message = String::from_utf8_lossy(&stderr).trim().to_string();
            return Err(OcrError::Service(if message.is_empty() {
                format!("{} exited with {}", self.options.program, status)
            } else {
                message
            }));
        }

        String::from_utf8(stdout)
            .map_err(|e| OcrError::MalformedResponse(format!("stdout is not UTF-8: {}", e)))
    }
}

impl OcrEngine for CommandOcrEngine {
    fn name(&self) -> &str {
        &self.options.program
    }

    fn recognize(&self, image: &[u8]) -> Result<OcrPage> {
        let mut file = tempfile::Builder::new()
            .prefix("kanji-ledger-")
            .suffix(".img")
            .tempfile()?;
        file.write_all(image)?;
        file.flush()?;

        let output = self.run(file.path())?;
        vision::parse_response(&output)
    }
}
