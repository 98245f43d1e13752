//! Scrapeline Core Library
//!
//! This library provides the core functionality for the scrapeline tool,
//! a staged web-scraping pipeline: discover links on pages, download the
//! linked files with collision-safe names, and keep resumable per-stage
//! statistics along the way.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`pipeline`] - Stage sequencing, shared state, and message queues
//! - [`job`] - The stages themselves plus the bounded fan-out executor
//! - [`fetch`] - HTTP client construction, fetching, and request pacing
//! - [`stats`] - Resumable per-stage statistics files
//! - [`cache`] - TTL-expiring JSON value cache
//! - [`context`] - Per-run configuration shared by every stage

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod stats;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheError, CacheManager};
pub use context::{ContextBuilder, ContextError, DEFAULT_WORKERS, DocumentFormat, ScrapeContext};
pub use error::{ItemError, ItemResult};
pub use job::{
    DiscovererConfig, DownloaderConfig, FileDownloader, JobError, Processor, ScrapeJob,
    UrlDiscoverer, fan_out,
};
pub use pipeline::queue::{Inspection, MessageQueue, QueueError};
pub use pipeline::{Pipeline, PipelineBus, PipelineMessage};
pub use stats::{StatsError, StatsLog, StatsRecorder};
