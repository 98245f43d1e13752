//! HTTP fetching for pipeline stages.
//!
//! One `reqwest::Client` is built per run (connection pooling) with the run's
//! headers attached as defaults; per-request timeouts come from the caller so
//! the downloader can use its longer per-file value. The [`Cooldown`] gate
//! implements sparse mode as a single shared pacing slot: with `max_workers`
//! tasks in flight, requests are still spaced to the intended single-stream
//! rate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ItemError, ItemResult};

/// A fetched document with the response metadata stages care about.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// The requested URL.
    pub url: String,
    /// HTTP status code (always a success code; failures become errors).
    pub status: u16,
    /// Content-Type header value, empty when absent.
    pub content_type: String,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl FetchedDocument {
    /// The body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builds the run's HTTP client with `headers` attached to every request.
///
/// # Errors
///
/// Returns `reqwest::Error` when the client cannot be constructed, or an
/// invalid-header error mapped by the caller.
pub fn build_client(headers: &HashMap<String, String>) -> Result<Client, BuildClientError> {
    let mut header_map = HeaderMap::new();
    for (name, value) in headers {
        let name: HeaderName = name
            .parse()
            .map_err(|_| BuildClientError::InvalidHeader { name: name.clone() })?;
        let value: HeaderValue = value
            .parse()
            .map_err(|_| BuildClientError::InvalidHeader {
                name: name.to_string(),
            })?;
        header_map.insert(name, value);
    }

    Client::builder()
        .default_headers(header_map)
        .gzip(true)
        .build()
        .map_err(BuildClientError::Client)
}

/// Errors from building the run's HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum BuildClientError {
    /// A configured request header is not a valid HTTP header.
    #[error("invalid request header: {name}")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },

    /// The underlying client builder failed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Fetches `url` with the given timeout, returning the whole body.
///
/// Non-success statuses become [`ItemError::Status`]; timeouts and network
/// failures become [`ItemError::Timeout`]/[`ItemError::Transport`].
///
/// # Errors
///
/// Item-level only; callers record the failure and continue their batch.
pub async fn fetch_url(client: &Client, url: &str, timeout: Duration) -> ItemResult<FetchedDocument> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ItemError::transport(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ItemError::status(url, status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let body = response
        .bytes()
        .await
        .map_err(|e| ItemError::transport(url, e))?;

    debug!(url, status = status.as_u16(), bytes = body.len(), "fetched");

    Ok(FetchedDocument {
        url: url.to_string(),
        status: status.as_u16(),
        content_type,
        body: body.to_vec(),
    })
}

/// Fetches `url` and streams the payload verbatim to `path`.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Item-level only: transport/status errors from the fetch, IO errors from
/// the write.
pub async fn fetch_to_file(
    client: &Client,
    url: &str,
    timeout: Duration,
    path: &Path,
) -> ItemResult<u64> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ItemError::transport(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ItemError::status(url, status.as_u16()));
    }

    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ItemError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ItemError::transport(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ItemError::io(path, e))?;
        written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| ItemError::io(path, e))?;
    debug!(url, path = %path.display(), bytes = written, "wrote file");
    Ok(written)
}

/// Shared request pacing gate for sparse mode.
///
/// Each caller reserves the next free slot and sleeps until it arrives, so
/// concurrent workers collectively hold the configured request rate instead
/// of each sleeping independently.
#[derive(Debug, Clone)]
pub struct Cooldown {
    enabled: bool,
    interval: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl Cooldown {
    /// Creates a gate; a disabled gate or a zero interval never waits.
    #[must_use]
    pub fn new(enabled: bool, interval: Duration) -> Self {
        Self {
            enabled,
            interval,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// True when the gate actually paces requests.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.interval.is_zero()
    }

    /// Waits for this caller's slot. Returns immediately when inactive.
    pub async fn acquire(&self) {
        if !self.is_active() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
