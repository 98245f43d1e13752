//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use scrapeline_core::context::DEFAULT_WORKERS;

/// Discover and download files through a staged scraping pipeline.
///
/// Scrapeline fetches the given pages, extracts matching links, and
/// downloads each link to disk with collision-safe names, keeping
/// resumable per-stage statistics.
#[derive(Parser, Debug)]
#[command(name = "scrapeline")]
#[command(author, version, about)]
pub struct Args {
    /// Page URLs to scrape (reads stdin when empty)
    pub urls: Vec<String>,

    /// JSON config file supplying defaults (flags override it)
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Base URL prefixed onto relative links (defaults to the first URL's origin)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory downloaded files are written into
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent requests per stage (1-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: Option<u8>,

    /// Pace requests through a shared cooldown gate
    #[arg(long)]
    pub sparse: bool,

    /// Spacing between requests in sparse mode, in milliseconds
    #[arg(long, value_name = "MS")]
    pub cooldown_ms: Option<u64>,

    /// Per-request timeout for page fetches, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Per-file timeout for downloads, in seconds
    #[arg(long, value_name = "SECS")]
    pub file_timeout_secs: Option<u64>,

    /// Filename stem for downloaded files
    #[arg(long)]
    pub basename: Option<String>,

    /// Probe past existing files instead of overwriting (true/false)
    #[arg(long, value_name = "BOOL")]
    pub append: Option<bool>,

    /// Keep per-stage stats files (true/false)
    #[arg(long, value_name = "BOOL")]
    pub save_stats: Option<bool>,

    /// Directory stats files are written under
    #[arg(long, value_name = "DIR")]
    pub stats_dir: Option<PathBuf>,

    /// Link-extraction regex (capture group 1 when present; defaults to href extraction)
    #[arg(long)]
    pub pattern: Option<String>,

    /// Merge failed URLs from a prior run's stats file into this batch
    #[arg(long, value_name = "PATH")]
    pub retry_stats: Option<PathBuf>,

    /// Print discovered links instead of downloading them
    #[arg(long)]
    pub discover_only: bool,

    /// Append-only run log file (best-effort, in addition to console output)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Effective worker count after applying the default.
    #[must_use]
    pub fn workers_or_default(&self, from_config: Option<usize>) -> usize {
        self.workers
            .map(usize::from)
            .or(from_config)
            .unwrap_or(DEFAULT_WORKERS)
    }
}
