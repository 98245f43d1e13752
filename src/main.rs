//! CLI entry point for the scrapeline tool.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use scrapeline_core::config::FileConfig;
use scrapeline_core::context::ScrapeContext;
use scrapeline_core::extract::{href_links, regex_links};
use scrapeline_core::job::process::merge_failed_from_stats;
use scrapeline_core::job::{
    DiscovererConfig, DownloaderConfig, FileDownloader, Processor, ScrapeJob, UrlDiscoverer,
};
use scrapeline_core::logging::RunLog;
use scrapeline_core::pipeline::Pipeline;
use tracing::{debug, info};
use url::Url;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Scrapeline starting");

    let file_config = match &args.config_file {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    // Read input: positional args, then config file, then stdin
    let urls = if !args.urls.is_empty() {
        args.urls.clone()
    } else if let Some(urls) = file_config.urls.clone().filter(|u| !u.is_empty()) {
        urls
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect()
    } else {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: echo 'https://example.com/gallery' | scrapeline");
        return Ok(());
    };

    if urls.is_empty() {
        info!("No URLs to process");
        return Ok(());
    }

    let base_url = args
        .base_url
        .clone()
        .or_else(|| file_config.base_url.clone())
        .or_else(|| origin_of(&urls[0]))
        .unwrap_or_default();

    let log = match args.log_file.as_ref().or(file_config.log_file.as_ref()) {
        Some(path) => RunLog::open(path),
        None => RunLog::disabled(),
    };

    let sparse = args.sparse || file_config.sparse.unwrap_or(false);
    let cooldown_ms = args.cooldown_ms.or(file_config.cooldown_ms).unwrap_or(200);
    let timeout_secs = args.timeout_secs.or(file_config.timeout_secs).unwrap_or(10);

    let mut builder = ScrapeContext::builder(base_url)
        .max_workers(args.workers_or_default(file_config.workers))
        .sparse_requests(sparse)
        .request_cooldown(Duration::from_millis(cooldown_ms))
        .request_timeout(Duration::from_secs(timeout_secs))
        .log(log);
    if let Some(headers) = file_config.headers.clone() {
        builder = builder.headers(headers);
    }
    let ctx = builder.build()?;

    let save_stats = args.save_stats.or(file_config.save_stats).unwrap_or(true);
    let stats_dir = args
        .stats_dir
        .clone()
        .or_else(|| file_config.stats_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let extractor = match args.pattern.as_ref().or(file_config.pattern.as_ref()) {
        Some(pattern) => regex_links(pattern)?,
        None => href_links(),
    };

    let mut jobs: Vec<Box<dyn ScrapeJob>> = Vec::new();

    if let Some(stats_path) = &args.retry_stats {
        debug!(path = %stats_path.display(), "merging failures from prior stats file");
        jobs.push(Box::new(Processor::new(
            "Retry Merge",
            merge_failed_from_stats(stats_path.clone()),
        )));
    }

    jobs.push(Box::new(UrlDiscoverer::new(
        "Link Discovery",
        DiscovererConfig {
            extractor,
            stats: save_stats,
            stats_dir: stats_dir.clone(),
        },
    )?));

    if !args.discover_only {
        let file_timeout = args
            .file_timeout_secs
            .or(file_config.file_timeout_secs)
            .unwrap_or(60);
        jobs.push(Box::new(FileDownloader::new(
            "File Download",
            DownloaderConfig {
                output_dir: args
                    .output_dir
                    .clone()
                    .or_else(|| file_config.output_dir.clone())
                    .unwrap_or_else(|| PathBuf::from(".")),
                base_name: args
                    .basename
                    .clone()
                    .or_else(|| file_config.basename.clone())
                    .unwrap_or_else(|| "file".to_string()),
                default_extension: file_config
                    .default_extension
                    .clone()
                    .unwrap_or_else(|| "jpg".to_string()),
                append: args.append.or(file_config.append).unwrap_or(true),
                timeout: Duration::from_secs(file_timeout),
                stats: save_stats,
                stats_dir,
            },
        )?));
    }

    let mut pipeline = Pipeline::new(jobs, ctx);
    let output = pipeline.run(urls).await?;

    if args.discover_only {
        for url in &output {
            println!("{url}");
        }
    }

    info!(items = output.len(), "Pipeline complete");
    Ok(())
}

/// Scheme and host of `url`, used as the default base for relative links.
fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let origin = match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    };
    Some(origin)
}
