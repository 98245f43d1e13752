//! Integration tests for the full scraping pipeline.
//!
//! These tests drive discover/download stages end to end against mock HTTP
//! servers and verify the on-disk artifacts: downloaded files, filename
//! collision handling, and the per-stage stats files.

use std::collections::HashSet;
use std::path::Path;

use scrapeline_core::job::process::merge_failed_from_stats;
use scrapeline_core::{
    DiscovererConfig, DownloaderConfig, FileDownloader, Pipeline, Processor, ScrapeContext,
    ScrapeJob, StatsLog, UrlDiscoverer,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts a 200 endpoint serving `content` at `path_str`.
async fn mount_file(server: &MockServer, path_str: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

fn read_stats(dir: &Path, file: &str) -> StatsLog {
    let text = std::fs::read_to_string(dir.join(file)).expect("stats file should exist");
    serde_json::from_str(&text).expect("stats file should parse")
}

fn downloader_config(dir: &TempDir) -> DownloaderConfig {
    DownloaderConfig {
        output_dir: dir.path().to_path_buf(),
        base_name: "image".to_string(),
        stats_dir: dir.path().to_path_buf(),
        ..DownloaderConfig::default()
    }
}

#[tokio::test]
async fn test_three_urls_with_one_failure_records_tries_and_fails() {
    let server = MockServer::start().await;
    mount_file(&server, "/a.jpg", b"aaa").await;
    mount_file(&server, "/b.jpg", b"bbb").await;
    Mock::given(method("GET"))
        .and(path("/c.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let ctx = ScrapeContext::builder(server.uri())
        .build()
        .expect("context should build");
    let downloader = FileDownloader::new("File Download", downloader_config(&dir))
        .expect("downloader should build");

    let mut pipeline = Pipeline::new(vec![Box::new(downloader)], ctx);
    let output = pipeline
        .run(vec![
            format!("{}/a.jpg", server.uri()),
            format!("{}/b.jpg", server.uri()),
            format!("{}/c.jpg", server.uri()),
        ])
        .await
        .expect("pipeline should complete");

    // Two files written, the 500 absorbed as an item failure.
    assert_eq!(output.len(), 2);
    let written: HashSet<Vec<u8>> = output
        .iter()
        .map(|p| std::fs::read(p).expect("output file should exist"))
        .collect();
    assert_eq!(written, HashSet::from([b"aaa".to_vec(), b"bbb".to_vec()]));

    let stats = read_stats(dir.path(), "file-download-stats.json");
    assert_eq!(stats.tries, 3);
    assert_eq!(stats.fails, 1);
    assert_eq!(
        stats.failed_urls(),
        vec![format!("{}/c.jpg", server.uri())]
    );
}

#[tokio::test]
async fn test_discovery_with_one_failing_page_collects_remaining_links() {
    let server = MockServer::start().await;
    mount_file(&server, "/p1", br#"<a href="/x.jpg">x</a>"#).await;
    mount_file(&server, "/p2", br#"<a href="http://cdn/y.jpg">y</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/p3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let ctx = ScrapeContext::builder(server.uri())
        .build()
        .expect("context should build");
    let discoverer = UrlDiscoverer::new(
        "Link Discovery",
        DiscovererConfig {
            stats_dir: dir.path().to_path_buf(),
            ..DiscovererConfig::default()
        },
    )
    .expect("discoverer should build");

    let mut pipeline = Pipeline::new(vec![Box::new(discoverer)], ctx);
    let output = pipeline
        .run(vec![
            format!("{}/p1", server.uri()),
            format!("{}/p2", server.uri()),
            format!("{}/p3", server.uri()),
        ])
        .await
        .expect("pipeline should complete");

    // Ordering follows completion, so assert set equality.
    let seen: HashSet<String> = output.into_iter().collect();
    let expected = HashSet::from([
        format!("{}/x.jpg", server.uri()),
        "http://cdn/y.jpg".to_string(),
    ]);
    assert_eq!(seen, expected);

    let stats = read_stats(dir.path(), "link-discovery-stats.json");
    assert_eq!(stats.tries, 3);
    assert_eq!(stats.fails, 1);
}

#[tokio::test]
async fn test_discover_then_download_end_to_end() {
    let server = MockServer::start().await;
    mount_file(
        &server,
        "/gallery",
        br#"<a href="/one.jpg">1</a> <a href="/two.jpg">2</a>"#,
    )
    .await;
    mount_file(&server, "/one.jpg", b"first").await;
    mount_file(&server, "/two.jpg", b"second").await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let ctx = ScrapeContext::builder(server.uri())
        .build()
        .expect("context should build");
    let discoverer = UrlDiscoverer::new(
        "Link Discovery",
        DiscovererConfig {
            stats_dir: dir.path().to_path_buf(),
            ..DiscovererConfig::default()
        },
    )
    .expect("discoverer should build");
    let downloader = FileDownloader::new("File Download", downloader_config(&dir))
        .expect("downloader should build");

    let mut pipeline = Pipeline::new(vec![Box::new(discoverer), Box::new(downloader)], ctx);
    let output = pipeline
        .run(vec![format!("{}/gallery", server.uri())])
        .await
        .expect("pipeline should complete");

    assert_eq!(output.len(), 2);
    assert_eq!(
        std::fs::read(dir.path().join("image-0000.jpg")).expect("first file"),
        b"first"
    );
    assert_eq!(
        std::fs::read(dir.path().join("image-0001.jpg")).expect("second file"),
        b"second"
    );

    let discovery = read_stats(dir.path(), "link-discovery-stats.json");
    assert_eq!(discovery.tries, 1);
    assert_eq!(discovery.fails, 0);
}

#[tokio::test]
async fn test_download_skips_existing_index_in_append_mode() {
    let server = MockServer::start().await;
    mount_file(&server, "/new.jpg", b"fresh").await;

    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(dir.path().join("image-0000.jpg"), b"old").expect("seed file");

    let ctx = ScrapeContext::builder(server.uri())
        .build()
        .expect("context should build");
    let downloader = FileDownloader::new("File Download", downloader_config(&dir))
        .expect("downloader should build");

    let mut pipeline = Pipeline::new(vec![Box::new(downloader)], ctx);
    pipeline
        .run(vec![format!("{}/new.jpg", server.uri())])
        .await
        .expect("pipeline should complete");

    // The existing file keeps its content; the download lands at the next index.
    assert_eq!(
        std::fs::read(dir.path().join("image-0000.jpg")).expect("seed intact"),
        b"old"
    );
    assert_eq!(
        std::fs::read(dir.path().join("image-0001.jpg")).expect("new file"),
        b"fresh"
    );
}

#[tokio::test]
async fn test_small_batch_output_preserves_input_order() {
    let server = MockServer::start().await;
    for name in ["a", "b", "c", "d"] {
        mount_file(&server, &format!("/{name}.jpg"), name.as_bytes()).await;
    }

    let dir = TempDir::new().expect("failed to create temp dir");
    let ctx = ScrapeContext::builder(server.uri())
        .build()
        .expect("context should build");
    let downloader = FileDownloader::new("File Download", downloader_config(&dir))
        .expect("downloader should build");

    let mut pipeline = Pipeline::new(vec![Box::new(downloader)], ctx);
    let output = pipeline
        .run(
            ["a", "b", "c", "d"]
                .iter()
                .map(|n| format!("{}/{n}.jpg", server.uri()))
                .collect(),
        )
        .await
        .expect("pipeline should complete");

    // Below the sequential threshold, output order is input order.
    let expected: Vec<String> = (0..4)
        .map(|i| dir.path().join(format!("image-000{i}.jpg")).display().to_string())
        .collect();
    assert_eq!(output, expected);
}

#[tokio::test]
async fn test_retry_merge_recovers_previously_failed_url() {
    let server = MockServer::start().await;
    mount_file(&server, "/a.jpg", b"aaa").await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let ctx = ScrapeContext::builder(server.uri())
        .build()
        .expect("context should build");

    // First run: the endpoint is missing, so the URL fails and lands in stats.
    let first_run_dir = TempDir::new().expect("failed to create temp dir");
    let failing = FileDownloader::new(
        "File Download",
        DownloaderConfig {
            output_dir: first_run_dir.path().to_path_buf(),
            base_name: "image".to_string(),
            stats_dir: dir.path().to_path_buf(),
            ..DownloaderConfig::default()
        },
    )
    .expect("downloader should build");
    let mut pipeline = Pipeline::new(vec![Box::new(failing)], ctx.clone());
    pipeline
        .run(vec![format!("{}/missing.jpg", server.uri())])
        .await
        .expect("pipeline should complete");

    let stats_path = dir.path().join("file-download-stats.json");
    assert_eq!(read_stats(dir.path(), "file-download-stats.json").fails, 1);

    // Second run: the merge processor pulls the failed URL back in alongside
    // the new one.
    let second_dir = TempDir::new().expect("failed to create temp dir");
    let merge: Box<dyn ScrapeJob> = Box::new(Processor::new(
        "Retry Merge",
        merge_failed_from_stats(stats_path),
    ));
    let retry = FileDownloader::new(
        "Retry Download",
        DownloaderConfig {
            output_dir: second_dir.path().to_path_buf(),
            base_name: "image".to_string(),
            stats_dir: second_dir.path().to_path_buf(),
            ..DownloaderConfig::default()
        },
    )
    .expect("downloader should build");

    let mut pipeline = Pipeline::new(vec![merge, Box::new(retry)], ctx);
    pipeline
        .run(vec![format!("{}/a.jpg", server.uri())])
        .await
        .expect("pipeline should complete");

    let retry_stats = read_stats(second_dir.path(), "retry-download-stats.json");
    // Retried URL is still missing, but it was attempted alongside the new one.
    assert_eq!(retry_stats.tries, 2);
    assert_eq!(retry_stats.fails, 1);
    assert_eq!(
        std::fs::read(second_dir.path().join("image-0000.jpg")).expect("new file"),
        b"aaa"
    );
}
