//! Link discovery stage.
//!
//! Fetches each input URL, hands the document to the configured extraction
//! function, and flattens the extracted links (absolutized against the
//! run's base URL) into the output batch. Ordering across concurrent items
//! follows completion order.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::context::ScrapeContext;
use crate::error::ItemError;
use crate::extract::{LinkExtractor, absolutize, href_links};
use crate::fetch::fetch_url;
use crate::job::pool::fan_out;
use crate::job::{JobError, ScrapeJob};
use crate::pipeline::PipelineBus;
use crate::progress::ProgressTracker;
use crate::stats::StatsRecorder;

/// Configuration for a [`UrlDiscoverer`].
#[derive(Clone)]
pub struct DiscovererConfig {
    /// Extraction function applied to each fetched document.
    pub extractor: LinkExtractor,
    /// Whether to keep a per-item stats log.
    pub stats: bool,
    /// Directory the stats file is written under.
    pub stats_dir: PathBuf,
}

impl Default for DiscovererConfig {
    fn default() -> Self {
        Self {
            extractor: href_links(),
            stats: true,
            stats_dir: PathBuf::from("."),
        }
    }
}

/// Stage that turns a batch of page URLs into a batch of extracted links.
pub struct UrlDiscoverer {
    name: String,
    extractor: LinkExtractor,
    tracker: ProgressTracker,
    recorder: StatsRecorder,
}

impl UrlDiscoverer {
    /// Creates a discoverer named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Persistence`] when an existing stats file for
    /// this stage cannot be read.
    pub fn new(name: impl Into<String>, config: DiscovererConfig) -> Result<Self, JobError> {
        let name = name.into();
        let recorder = StatsRecorder::new(&name, &config.stats_dir, config.stats)?;
        Ok(Self {
            name,
            extractor: config.extractor,
            tracker: ProgressTracker::new(),
            recorder,
        })
    }
}

#[async_trait]
impl ScrapeJob for UrlDiscoverer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &mut self,
        items: Vec<String>,
        ctx: &ScrapeContext,
        bus: &mut PipelineBus,
    ) -> Result<Vec<String>, JobError> {
        self.tracker.start(items.len(), &self.name);

        let client = ctx.client().clone();
        let cooldown = ctx.cooldown().clone();
        let extractor = self.extractor.clone();
        let base_url = ctx.base_url.clone();
        let timeout = ctx.request_timeout;

        let worker = move |url: String| {
            let client = client.clone();
            let cooldown = cooldown.clone();
            let extractor = extractor.clone();
            let base_url = base_url.clone();
            async move {
                cooldown.acquire().await;
                let document = fetch_url(&client, &url, timeout).await?;
                let links = extractor(&document)
                    .map_err(|err| ItemError::extraction(&url, err.to_string()))?;
                Ok(links
                    .iter()
                    .map(|link| absolutize(&base_url, link))
                    .collect::<Vec<String>>())
            }
        };

        let tracker = &mut self.tracker;
        let recorder = &mut self.recorder;
        let name = self.name.as_str();
        let results = fan_out(items, ctx.max_workers, worker, |url, result| {
            tracker.advance();
            let ident = url.map_or("(lost)", String::as_str);
            recorder.record(ident, result.is_ok());
            if let Err(err) = result {
                tracker.fail();
                ctx.log().error(name, &err.to_string());
            }
        })
        .await;

        let output: Vec<String> = results
            .into_iter()
            .filter_map(|(_, result)| result.ok())
            .flatten()
            .collect();

        self.tracker.stop();
        bus.set_state(format!("{name}.output_count"), json!(output.len()));
        info!(
            stage = name,
            tries = self.tracker.tries(),
            fails = self.tracker.fails(),
            links = output.len(),
            "discovery finished"
        );
        Ok(output)
    }

    fn on_exit(&mut self, ctx: &ScrapeContext) -> Result<(), JobError> {
        ctx.log().info(
            &self.name,
            &format!(
                "Scanned {} pages, failed to get {}",
                self.tracker.tries(),
                self.tracker.fails()
            ),
        );
        self.recorder.save()?;
        Ok(())
    }
}
