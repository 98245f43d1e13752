//! File download stage.
//!
//! Streams each URL's payload to disk under a derived filename
//! (`<base>-<index><ext>`). Filename derivation happens on the
//! orchestrating task before any download is dispatched, so the naming
//! decision is serialized even though the writes run concurrently. The
//! collision scan is not atomic across processes; two runs sharing an
//! output directory can race.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::context::ScrapeContext;
use crate::fetch::fetch_to_file;
use crate::job::pool::fan_out;
use crate::job::{JobError, ScrapeJob};
use crate::pipeline::PipelineBus;
use crate::progress::ProgressTracker;
use crate::stats::StatsRecorder;

/// Widest extension (without the dot) still trusted from a URL.
const MAX_EXTENSION_LEN: usize = 4;

/// Zero-padding width of the filename index.
const INDEX_WIDTH: usize = 4;

/// Configuration for a [`FileDownloader`].
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Directory downloaded files are written into.
    pub output_dir: PathBuf,
    /// Filename stem, indexed per item.
    pub base_name: String,
    /// Extension used when the URL does not carry a usable one.
    pub default_extension: String,
    /// Probe for the next free index instead of overwriting.
    pub append: bool,
    /// Per-file timeout, typically longer than the discovery timeout.
    pub timeout: Duration,
    /// Whether to keep a per-item stats log.
    pub stats: bool,
    /// Directory the stats file is written under.
    pub stats_dir: PathBuf,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            base_name: "file".to_string(),
            default_extension: "jpg".to_string(),
            append: true,
            timeout: Duration::from_secs(60),
            stats: true,
            stats_dir: PathBuf::from("."),
        }
    }
}

/// Stage that persists each input URL's payload to disk.
pub struct FileDownloader {
    name: String,
    config: DownloaderConfig,
    tracker: ProgressTracker,
    recorder: StatsRecorder,
}

impl FileDownloader {
    /// Creates a downloader named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Persistence`] when an existing stats file for
    /// this stage cannot be read.
    pub fn new(name: impl Into<String>, config: DownloaderConfig) -> Result<Self, JobError> {
        let name = name.into();
        let recorder = StatsRecorder::new(&name, &config.stats_dir, config.stats)?;
        Ok(Self {
            name,
            config,
            tracker: ProgressTracker::new(),
            recorder,
        })
    }

    /// Pulls an extension off a URL's trailing path segment, falling back
    /// to the configured default when none is usable.
    fn infer_extension(&self, url: &str, ctx: &ScrapeContext) -> String {
        let tail = url
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .split(['?', '#'])
            .next()
            .unwrap_or("");
        if let Some((_, ext)) = tail.rsplit_once('.') {
            let usable = !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric());
            if usable {
                return ext.to_ascii_lowercase();
            }
        }
        ctx.log().warn(
            &self.name,
            &format!(
                "no usable extension on {url}, defaulting to .{}",
                self.config.default_extension
            ),
        );
        self.config.default_extension.clone()
    }

    /// Derives a destination path for `index`, probing forward past
    /// existing files when append mode is on. Returns the path and the
    /// index the next item should start from.
    fn derive_path(&self, start_index: usize, extension: &str) -> (PathBuf, usize) {
        let mut index = start_index;
        loop {
            let candidate = self.config.output_dir.join(format!(
                "{}-{:0INDEX_WIDTH$}.{}",
                self.config.base_name, index, extension
            ));
            if !self.config.append || !candidate.exists() {
                return (candidate, index + 1);
            }
            index += 1;
        }
    }
}

#[async_trait]
impl ScrapeJob for FileDownloader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &mut self,
        items: Vec<String>,
        ctx: &ScrapeContext,
        bus: &mut PipelineBus,
    ) -> Result<Vec<String>, JobError> {
        std::fs::create_dir_all(&self.config.output_dir).map_err(|err| {
            JobError::config(format!(
                "cannot create output directory {}: {err}",
                self.config.output_dir.display()
            ))
        })?;

        self.tracker.start(items.len(), &self.name);

        // Naming happens here, before dispatch, so concurrent writes never
        // contend over the same index.
        let mut next_index = 0;
        let mut planned: Vec<(String, PathBuf)> = Vec::with_capacity(items.len());
        for url in items {
            let extension = self.infer_extension(&url, ctx);
            let (path, following) = self.derive_path(next_index, &extension);
            next_index = following;
            planned.push((url, path));
        }

        let client = ctx.client().clone();
        let cooldown = ctx.cooldown().clone();
        let timeout = self.config.timeout;

        let worker = move |(url, path): (String, PathBuf)| {
            let client = client.clone();
            let cooldown = cooldown.clone();
            async move {
                cooldown.acquire().await;
                fetch_to_file(&client, &url, timeout, &path).await?;
                Ok(path.display().to_string())
            }
        };

        let tracker = &mut self.tracker;
        let recorder = &mut self.recorder;
        let name = self.name.as_str();
        let results = fan_out(planned, ctx.max_workers, worker, |plan, result| {
            tracker.advance();
            let ident = plan.map_or("(lost)", |(url, _)| url.as_str());
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
            .collect();

        self.tracker.stop();
        bus.set_state(format!("{name}.output_count"), json!(output.len()));
        info!(
            stage = name,
            tries = self.tracker.tries(),
            fails = self.tracker.fails(),
            files = output.len(),
            "downloads finished"
        );
        Ok(output)
    }

    fn on_exit(&mut self, ctx: &ScrapeContext) -> Result<(), JobError> {
        ctx.log().info(
            &self.name,
            &format!(
                "Downloaded {} of {} files",
                self.tracker.tries() - self.tracker.fails(),
                self.tracker.tries()
            ),
        );
        self.recorder.save()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn downloader(dir: &TempDir, base: &str) -> FileDownloader {
        FileDownloader::new(
            "Test Download",
            DownloaderConfig {
                output_dir: dir.path().to_path_buf(),
                base_name: base.to_string(),
                stats_dir: dir.path().to_path_buf(),
                ..DownloaderConfig::default()
            },
        )
        .unwrap()
    }

    async fn test_context(base_url: &str) -> ScrapeContext {
        ScrapeContext::builder(base_url).build().unwrap()
    }

    #[test]
    fn test_extension_inferred_from_url() {
        let dir = TempDir::new().unwrap();
        let stage = downloader(&dir, "image");
        let ctx = ScrapeContext::builder("http://site").build().unwrap();
        assert_eq!(stage.infer_extension("http://x/a/photo.PNG", &ctx), "png");
        assert_eq!(stage.infer_extension("http://x/a/photo.png?s=1", &ctx), "png");
    }

    #[test]
    fn test_extension_falls_back_on_long_or_missing_suffix() {
        let dir = TempDir::new().unwrap();
        let stage = downloader(&dir, "image");
        let ctx = ScrapeContext::builder("http://site").build().unwrap();
        assert_eq!(stage.infer_extension("http://x/archive.backup", &ctx), "jpg");
        assert_eq!(stage.infer_extension("http://x/no-extension", &ctx), "jpg");
    }

    #[test]
    fn test_collision_probe_selects_next_free_index() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("image-0000.jpg"), b"existing").unwrap();
        let stage = downloader(&dir, "image");
        let (path, next) = stage.derive_path(0, "jpg");
        assert_eq!(path, dir.path().join("image-0001.jpg"));
        assert_eq!(next, 2);
    }

    #[test]
    fn test_append_disabled_reuses_taken_index() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("image-0000.jpg"), b"existing").unwrap();
        let mut stage = downloader(&dir, "image");
        stage.config.append = false;
        let (path, _) = stage.derive_path(0, "jpg");
        assert_eq!(path, dir.path().join("image-0000.jpg"));
    }

    #[tokio::test]
    async fn test_downloads_batch_and_reports_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"aaa".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bbbb".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ctx = test_context(&server.uri()).await;
        let mut bus = PipelineBus::new();
        let mut stage = downloader(&dir, "image");

        let output = stage
            .execute(
                vec![
                    format!("{}/a.jpg", server.uri()),
                    format!("{}/b.jpg", server.uri()),
                ],
                &ctx,
                &mut bus,
            )
            .await
            .unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(
            std::fs::read(dir.path().join("image-0000.jpg")).unwrap(),
            b"aaa"
        );
        assert_eq!(
            std::fs::read(dir.path().join("image-0001.jpg")).unwrap(),
            b"bbbb"
        );
        assert_eq!(stage.tracker.tries(), 2);
        assert_eq!(stage.tracker.fails(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_item_level() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ctx = test_context(&server.uri()).await;
        let mut bus = PipelineBus::new();
        let mut stage = downloader(&dir, "image");

        let output = stage
            .execute(vec![format!("{}/missing.jpg", server.uri())], &ctx, &mut bus)
            .await
            .unwrap();

        assert!(output.is_empty());
        assert_eq!(stage.tracker.fails(), 1);
    }
}
