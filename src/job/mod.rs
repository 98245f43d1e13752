//! Pipeline stages.
//!
//! A stage is anything implementing [`ScrapeJob`]: it consumes the previous
//! stage's item list, does its work (usually by fanning items out over the
//! worker pool in [`pool`]), and returns the item list for the next stage.
//! Item-level failures never surface here; [`JobError`] is reserved for
//! conditions that make the whole run unsound.

pub mod discover;
pub mod download;
pub mod pool;
pub mod process;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::ScrapeContext;
use crate::pipeline::PipelineBus;
use crate::stats::StatsError;

pub use discover::{DiscovererConfig, UrlDiscoverer};
pub use download::{DownloaderConfig, FileDownloader};
pub use pool::fan_out;
pub use process::Processor;

/// Fatal stage errors that abort the pipeline.
#[derive(Debug, Error)]
pub enum JobError {
    /// The stage was configured in a way it cannot run with.
    #[error("stage configuration error: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
    },

    /// A stats log could not be read or written.
    #[error(transparent)]
    Persistence(#[from] StatsError),
}

impl JobError {
    /// Builds a [`JobError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// One stage of a scraping pipeline.
#[async_trait]
pub trait ScrapeJob: Send {
    /// Human-readable stage name, used for logging, stats files, and
    /// message provenance.
    fn name(&self) -> &str;

    /// Runs the stage over `items`, returning the items for the next stage.
    ///
    /// Per-item failures must be absorbed (counted, logged) rather than
    /// propagated; an `Err` aborts the pipeline.
    async fn execute(
        &mut self,
        items: Vec<String>,
        ctx: &ScrapeContext,
        bus: &mut PipelineBus,
    ) -> Result<Vec<String>, JobError>;

    /// Called after `execute` completes, before the next stage starts.
    /// Stages persist their stats logs here.
    fn on_exit(&mut self, ctx: &ScrapeContext) -> Result<(), JobError>;
}
