//! Per-item error taxonomy for stage execution.
//!
//! Every variant represents the failure of a single unit of work inside a
//! batch. Item errors are recorded, logged with the originating URL, and
//! excluded from stage output; they never abort the batch they belong to.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can fail a single item within a stage's batch.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The extraction callback found no usable content in a document.
    #[error("extraction failed for {url}: {message}")]
    Extraction {
        /// The URL whose document yielded nothing.
        url: String,
        /// What the extractor reported.
        message: String,
    },

    /// File system error while persisting a payload.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The worker pool rejected or lost the task itself.
    #[error("task submission failed: {message}")]
    Submission {
        /// Description of the pool-level failure.
        message: String,
    },
}

impl ItemError {
    /// Creates a transport error from a reqwest error, classifying timeouts.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Transport { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Creates an extraction error.
    pub fn extraction(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a pool submission error.
    pub fn submission(message: impl Into<String>) -> Self {
        Self::Submission {
            message: message.into(),
        }
    }
}

// Note: no blanket `From<reqwest::Error>`/`From<std::io::Error>` impls.
// Variants require context (url, path) that the source errors don't carry;
// the helper constructors are the supported way to build them.

/// Result alias for per-item operations.
pub type ItemResult<T> = Result<T, ItemError>;
