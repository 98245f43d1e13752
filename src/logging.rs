//! Run log sink for stage output.
//!
//! Stages report progress summaries and item failures through a [`RunLog`].
//! Lines always reach the console via `tracing`; when a log file is
//! configured they are additionally appended there as
//! `LEVEL: <stage-name> - <iso8601>| <message>`. The file sink is
//! best-effort: a failed write never interrupts a run.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use tracing::warn;

/// Severity labels used in file sink lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Informational summary lines.
    Info,
    /// Recoverable, item-level problems.
    Warn,
    /// Item or stage failures.
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Cloneable handle to the run's log sink.
///
/// The process continues without a file sink when none is configured or the
/// file cannot be opened; console output is unconditional either way.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    file: Option<Arc<Mutex<File>>>,
}

impl RunLog {
    /// Creates a console-only log.
    #[must_use]
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Opens `path` in append mode as the file sink.
    ///
    /// Open failure is reported and results in a console-only log rather
    /// than an error: losing the optional sink is not worth aborting a run.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                file: Some(Arc::new(Mutex::new(file))),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open log file, continuing without file sink");
                Self { file: None }
            }
        }
    }

    /// Returns true when a file sink is attached.
    #[must_use]
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    /// Emits an info line.
    pub fn info(&self, stage: &str, message: &str) {
        tracing::info!(stage, "{message}");
        self.append(LogLevel::Info, stage, message);
    }

    /// Emits a warning line.
    pub fn warn(&self, stage: &str, message: &str) {
        tracing::warn!(stage, "{message}");
        self.append(LogLevel::Warn, stage, message);
    }

    /// Emits an error line.
    pub fn error(&self, stage: &str, message: &str) {
        tracing::error!(stage, "{message}");
        self.append(LogLevel::Error, stage, message);
    }

    fn append(&self, level: LogLevel, stage: &str, message: &str) {
        let Some(file) = &self.file else {
            return;
        };
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let line = format!("{}: {} - {}| {}\n", level.as_str(), stage, timestamp, message);
        if let Ok(mut file) = file.lock() {
            // Best-effort: a full disk must not kill the run.
            let _ = file.write_all(line.as_bytes());
        }
    }
}
