//! Transform stage.
//!
//! Wraps a synchronous `items -> items` function. Runs once per batch, not
//! per item and not pooled. A failed transform is logged and the input
//! passes through unchanged; a processor must never drop items from the
//! pipeline.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::ScrapeContext;
use crate::job::{JobError, ScrapeJob};
use crate::pipeline::PipelineBus;
use crate::stats::StatsRecorder;

/// A synchronous batch transform.
pub type Transform = Box<dyn FnMut(&[String]) -> anyhow::Result<Vec<String>> + Send>;

/// Stage applying an arbitrary transform to the item list.
pub struct Processor {
    name: String,
    transform: Transform,
}

impl Processor {
    /// Creates a processor named `name` around `transform`.
    #[must_use]
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
        }
    }
}

#[async_trait]
impl ScrapeJob for Processor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &mut self,
        items: Vec<String>,
        ctx: &ScrapeContext,
        _bus: &mut PipelineBus,
    ) -> Result<Vec<String>, JobError> {
        match (self.transform)(&items) {
            Ok(output) => {
                info!(
                    stage = self.name.as_str(),
                    input = items.len(),
                    output = output.len(),
                    "transform applied"
                );
                Ok(output)
            }
            Err(err) => {
                warn!(
                    stage = self.name.as_str(),
                    error = %err,
                    "transform failed, passing input through unchanged"
                );
                ctx.log()
                    .error(&self.name, &format!("transform failed: {err}"));
                Ok(items)
            }
        }
    }

    fn on_exit(&mut self, _ctx: &ScrapeContext) -> Result<(), JobError> {
        Ok(())
    }
}

/// Transform that merges a previous run's failed URLs (read from the stats
/// file at `path`) into the batch, skipping duplicates. Pair with a
/// download stage to retry what the last run dropped.
pub fn merge_failed_from_stats(path: impl Into<PathBuf>) -> Transform {
    let path = path.into();
    Box::new(move |items: &[String]| {
        let recorder = StatsRecorder::at_path(path.clone(), true)?;
        let mut merged = items.to_vec();
        for url in recorder.log().failed_urls() {
            if !merged.contains(&url) {
                merged.push(url);
            }
        }
        Ok(merged)
    })
}
