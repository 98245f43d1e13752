//! Shared run configuration.
//!
//! A [`ScrapeContext`] is built once per pipeline and is immutable for the
//! pipeline's lifetime; every stage invocation receives it by reference. The
//! original duck-typed kwargs configuration is replaced by an explicit,
//! validated builder.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::fetch::{BuildClientError, Cooldown, build_client};
use crate::logging::RunLog;

/// Minimum allowed worker-pool size.
const MIN_WORKERS: usize = 1;

/// Maximum allowed worker-pool size.
const MAX_WORKERS: usize = 100;

/// Default worker-pool size.
pub const DEFAULT_WORKERS: usize = 16;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cooldown between requests in sparse mode.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(200);

/// User-Agent attached when the caller configures none.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

/// Hint for collaborators parsing fetched documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    /// HTML documents (the common case).
    #[default]
    Html,
    /// Unstructured text.
    PlainText,
}

/// Errors from building a run context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Worker-pool size outside the valid range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] BuildClientError),
}

/// Immutable configuration shared by every stage of one pipeline run.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    /// Parser/format hint for document collaborators.
    pub format: DocumentFormat,
    /// Prefix used to absolutize relative links.
    pub base_url: String,
    /// Whether the cooldown gate paces requests.
    pub sparse_requests: bool,
    /// Spacing between requests when sparse mode is on.
    pub request_cooldown: Duration,
    /// Per-request timeout for discovery fetches.
    pub request_timeout: Duration,
    /// Bound on concurrent in-flight tasks per stage.
    pub max_workers: usize,
    /// Headers attached to every request.
    pub request_headers: HashMap<String, String>,
    client: Client,
    cooldown: Cooldown,
    log: RunLog,
}

impl ScrapeContext {
    /// Starts a builder for a run rooted at `base_url`.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ContextBuilder {
        ContextBuilder::new(base_url)
    }

    /// The run's pooled HTTP client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The shared request pacing gate.
    #[must_use]
    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// The run's log sink.
    #[must_use]
    pub fn log(&self) -> &RunLog {
        &self.log
    }
}

/// Builder for [`ScrapeContext`] with validated fields and defaults.
#[derive(Debug)]
pub struct ContextBuilder {
    format: DocumentFormat,
    base_url: String,
    sparse_requests: bool,
    request_cooldown: Duration,
    request_timeout: Duration,
    max_workers: usize,
    request_headers: HashMap<String, String>,
    log: RunLog,
}

impl ContextBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            format: DocumentFormat::default(),
            base_url: base_url.into(),
            sparse_requests: false,
            request_cooldown: DEFAULT_COOLDOWN,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_workers: DEFAULT_WORKERS,
            request_headers: HashMap::new(),
            log: RunLog::disabled(),
        }
    }

    /// Sets the document format hint.
    #[must_use]
    pub fn format(mut self, format: DocumentFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables sparse mode.
    #[must_use]
    pub fn sparse_requests(mut self, sparse: bool) -> Self {
        self.sparse_requests = sparse;
        self
    }

    /// Sets the sparse-mode request spacing.
    #[must_use]
    pub fn request_cooldown(mut self, cooldown: Duration) -> Self {
        self.request_cooldown = cooldown;
        self
    }

    /// Sets the per-request timeout for discovery fetches.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the worker-pool bound (validated at build).
    #[must_use]
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Adds one request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(name.into(), value.into());
        self
    }

    /// Replaces the request header map.
    #[must_use]
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.request_headers = headers;
        self
    }

    /// Attaches the run's log sink.
    #[must_use]
    pub fn log(mut self, log: RunLog) -> Self {
        self.log = log;
        self
    }

    /// Validates the configuration and builds the context (including the
    /// HTTP client and cooldown gate).
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] for an out-of-range worker count or an
    /// unbuildable HTTP client.
    pub fn build(mut self) -> Result<ScrapeContext, ContextError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.max_workers) {
            return Err(ContextError::InvalidWorkers {
                value: self.max_workers,
            });
        }
        self.request_headers
            .entry("User-Agent".to_string())
            .or_insert_with(|| DEFAULT_USER_AGENT.to_string());

        let client = build_client(&self.request_headers)?;
        let cooldown = Cooldown::new(self.sparse_requests, self.request_cooldown);

        Ok(ScrapeContext {
            format: self.format,
            base_url: self.base_url,
            sparse_requests: self.sparse_requests,
            request_cooldown: self.request_cooldown,
            request_timeout: self.request_timeout,
            max_workers: self.max_workers,
            request_headers: self.request_headers,
            client,
            cooldown,
            log: self.log,
        })
    }
}
