//! Per-item outcome statistics with JSON persistence.
//!
//! Each stage owns a [`StatsRecorder`]: one `(url, success)` record is
//! appended per processed item, always on the orchestrating task after the
//! worker future resolves. The accumulated [`StatsLog`] is written to disk at
//! stage exit and reloaded at construction on the next run, which is what
//! makes a failed subset retryable.
//!
//! File format: `{"tries": N, "fails": M, "urls": [{"value": ..., "processed": ...}]}`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or persisting a stats file.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Reading or writing the stats file failed.
    #[error("IO error for stats file {path}: {source}")]
    Io {
        /// The stats file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The stats file contents were not valid JSON for a [`StatsLog`].
    #[error("malformed stats file {path}: {source}")]
    Malformed {
        /// The stats file path.
        path: PathBuf,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of one processed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    /// The item identifier, typically a URL.
    pub value: String,
    /// Whether the item was processed successfully.
    pub processed: bool,
}

/// Accumulated outcomes for one stage.
///
/// Invariants: `tries == urls.len()` and `fails` equals the number of records
/// with `processed == false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsLog {
    /// Total items attempted.
    pub tries: u64,
    /// Items that failed.
    pub fails: u64,
    /// Per-item records in processing order.
    pub urls: Vec<StatRecord>,
}

impl StatsLog {
    /// Appends one outcome, keeping the counters consistent.
    pub fn record(&mut self, value: impl Into<String>, processed: bool) {
        self.tries += 1;
        if !processed {
            self.fails += 1;
        }
        self.urls.push(StatRecord {
            value: value.into(),
            processed,
        });
    }

    /// All recorded item values, in order.
    #[must_use]
    pub fn all_urls(&self) -> Vec<String> {
        self.urls.iter().map(|r| r.value.clone()).collect()
    }

    /// Values of the records that failed, in order.
    #[must_use]
    pub fn failed_urls(&self) -> Vec<String> {
        self.urls
            .iter()
            .filter(|r| !r.processed)
            .map(|r| r.value.clone())
            .collect()
    }

    /// Drops failed records and resets the failure counter, leaving only the
    /// processed subset. Used before re-running a failure list.
    pub fn prune_failed(&mut self) {
        self.urls.retain(|r| r.processed);
        self.tries -= self.fails;
        self.fails = 0;
    }
}

/// Records outcomes for a named stage and persists them as JSON.
#[derive(Debug)]
pub struct StatsRecorder {
    log: StatsLog,
    path: PathBuf,
    enabled: bool,
}

impl StatsRecorder {
    /// Creates a recorder for `stage_name`, resuming from an existing stats
    /// file when one is present at the derived path.
    ///
    /// The file lives at `<output_dir>/<slug(stage_name)>-stats.json`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when an existing file cannot be read or parsed.
    pub fn new(stage_name: &str, output_dir: &Path, enabled: bool) -> Result<Self, StatsError> {
        let path = output_dir.join(format!("{}-stats.json", slugify(stage_name)));
        Self::at_path(path, enabled)
    }

    /// Creates a recorder with an explicit stats file path.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when an existing file cannot be read or parsed.
    pub fn at_path(path: impl Into<PathBuf>, enabled: bool) -> Result<Self, StatsError> {
        let path = path.into();
        let log = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| StatsError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| StatsError::Malformed {
                path: path.clone(),
                source,
            })?
        } else {
            StatsLog::default()
        };
        Ok(Self { log, path, enabled })
    }

    /// Appends one outcome. No-op when stats saving is disabled.
    pub fn record(&mut self, value: impl Into<String>, processed: bool) {
        if self.enabled {
            self.log.record(value, processed);
        }
    }

    /// The accumulated log.
    #[must_use]
    pub fn log(&self) -> &StatsLog {
        &self.log
    }

    /// Removes failed records from the log; see [`StatsLog::prune_failed`].
    pub fn prune_failed(&mut self) {
        self.log.prune_failed();
    }

    /// The stats file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the log to disk. No-op when disabled.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Io`] when the write fails. Silent loss of run
    /// statistics is worse than a crash, so the error propagates.
    pub fn save(&self) -> Result<(), StatsError> {
        if !self.enabled {
            return Ok(());
        }
        let body = serde_json::to_string_pretty(&self.log).map_err(|source| {
            StatsError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, body).map_err(|source| StatsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Converts a stage name to a filesystem-safe slug: lowercase ASCII
/// alphanumerics with runs of anything else collapsed to single hyphens.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_hyphen = true; // suppress a leading hyphen
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_hyphen = false;
        } else if !prev_hyphen {
            out.push('-');
            prev_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
