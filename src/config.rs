//! JSON config-file loading for the CLI.
//!
//! A config file supplies defaults for the run; command-line flags override
//! whatever it sets. Unknown keys are rejected so typos fail loudly instead
//! of being ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Errors from loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or carries unknown keys.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A value parsed but is unusable.
    #[error("invalid config value: {message}")]
    Validation {
        /// What was wrong with the value.
        message: String,
    },
}

/// Run defaults read from a JSON config file. Every field is optional;
/// absent fields fall back to the CLI's own defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// URLs to feed the pipeline when none are given on the command line.
    pub urls: Option<Vec<String>>,
    /// Base URL for absolutizing relative links.
    pub base_url: Option<String>,
    /// Directory downloads are written into.
    pub output_dir: Option<PathBuf>,
    /// Worker-pool bound.
    pub workers: Option<usize>,
    /// Pace requests through the cooldown gate.
    pub sparse: Option<bool>,
    /// Cooldown spacing in milliseconds.
    pub cooldown_ms: Option<u64>,
    /// Discovery request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Per-file download timeout in seconds.
    pub file_timeout_secs: Option<u64>,
    /// Filename stem for downloads.
    pub basename: Option<String>,
    /// Extension used when a URL carries none.
    pub default_extension: Option<String>,
    /// Probe past existing files instead of overwriting.
    pub append: Option<bool>,
    /// Keep per-stage stats files.
    pub save_stats: Option<bool>,
    /// Directory stats files are written under.
    pub stats_dir: Option<PathBuf>,
    /// Link-extraction regex for the discovery stage.
    pub pattern: Option<String>,
    /// Extra request headers.
    pub headers: Option<HashMap<String, String>>,
    /// Append-only run log path.
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unreadable files, malformed JSON,
    /// unknown keys, or an extraction pattern that does not compile.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(pattern) = &self.pattern {
            Regex::new(pattern).map_err(|err| ConfigError::Validation {
                message: format!("extraction pattern does not compile: {err}"),
            })?;
        }
        if let Some(0) = self.workers {
            return Err(ConfigError::Validation {
                message: "workers must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "urls": ["http://site/a"],
                "base_url": "http://site",
                "workers": 8,
                "sparse": true,
                "cooldown_ms": 500,
                "basename": "image",
                "pattern": "href=\"([^\"]+)\""
            }"#,
        );
        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.urls, Some(vec!["http://site/a".to_string()]));
        assert_eq!(config.workers, Some(8));
        assert_eq!(config.sparse, Some(true));
        assert_eq!(config.basename.as_deref(), Some("image"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"worker_count": 8}"#);
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_bad_pattern_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"pattern": "(["}"#);
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"workers": 0}"#);
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = FileConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
