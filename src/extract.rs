//! Link extraction collaborators.
//!
//! Discovery treats extraction as an injected function over a fetched
//! document; site-specific scraping logic lives in these closures, not in
//! the stage. Two stock extractors cover the common cases, and callers can
//! supply their own.

use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::fetch::FetchedDocument;

/// Matches `href="..."` and `href='...'` attribute values.
const HREF_PATTERN: &str = r#"href\s*=\s*["']([^"'<>\s]+)["']"#;

/// An extraction callback found no usable content.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExtractionError {
    message: String,
}

impl ExtractionError {
    /// Builds an extraction error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Extraction function handed to a discovery stage. Shared because worker
/// tasks each hold a clone.
pub type LinkExtractor =
    Arc<dyn Fn(&FetchedDocument) -> Result<Vec<String>, ExtractionError> + Send + Sync>;

/// Extractor returning every capture of `pattern` in the document body.
///
/// Uses capture group 1 when the pattern defines one, the whole match
/// otherwise. An empty result set is an [`ExtractionError`], which the
/// discovery stage counts as an item failure.
///
/// # Errors
///
/// Returns [`regex::Error`] when `pattern` does not compile.
pub fn regex_links(pattern: &str) -> Result<LinkExtractor, regex::Error> {
    let regex = Regex::new(pattern)?;
    Ok(Arc::new(move |document: &FetchedDocument| {
        let body = document.text();
        let links: Vec<String> = regex
            .captures_iter(&body)
            .filter_map(|captures| {
                captures
                    .get(1)
                    .or_else(|| captures.get(0))
                    .map(|m| m.as_str().to_string())
            })
            .collect();
        if links.is_empty() {
            Err(ExtractionError::new(format!(
                "no links matched pattern in {}",
                document.url
            )))
        } else {
            Ok(links)
        }
    }))
}

/// Stock extractor pulling `href` attribute values out of HTML.
///
/// # Panics
///
/// Never panics; the pattern is a compile-time constant verified by tests.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn href_links() -> LinkExtractor {
    regex_links(HREF_PATTERN).unwrap()
}

/// Prefixes `base_url` onto relative links; absolute links pass through.
#[must_use]
pub fn absolutize(base_url: &str, link: &str) -> String {
    if link.contains("://") {
        return link.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        link.trim_start_matches('/')
    )
}
