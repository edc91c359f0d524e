// Tests for multi-seed crawl orchestration

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trawl_core::crawl::{CrawlOptions, CrawlProgressCallback, execute_crawl_with, extract_url_path};
use trawl_scanner::{Document, Fetcher, ScanError, host_of};

struct StaticDocument(Vec<String>);

impl Document for StaticDocument {
    fn extract_links(&self) -> Result<Vec<String>, ScanError> {
        Ok(self.0.clone())
    }
}

/// Serves a fixed link graph and tracks how many fetches run per host.
#[derive(Default)]
struct SiteFetcher {
    links: HashMap<String, Vec<String>>,
    active: Mutex<HashMap<String, usize>>,
    peak: Mutex<HashMap<String, usize>>,
}

impl SiteFetcher {
    fn link(mut self, from: &str, to: &[&str]) -> Self {
        self.links
            .insert(from.to_string(), to.iter().map(|s| s.to_string()).collect());
        self
    }

    fn peak_for(&self, host: &str) -> usize {
        self.peak.lock().unwrap().get(host).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for SiteFetcher {
    async fn fetch(&self, url: &str) -> Result<Box<dyn Document>, ScanError> {
        let host = host_of(url)?;
        {
            let mut active = self.active.lock().unwrap();
            let now = active.entry(host.clone()).or_insert(0);
            *now += 1;
            let mut peak = self.peak.lock().unwrap();
            let best = peak.entry(host.clone()).or_insert(0);
            *best = (*best).max(*now);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        *self.active.lock().unwrap().get_mut(&host).unwrap() -= 1;

        if url.contains("missing") {
            return Err(ScanError::Status { status: 404 });
        }
        let links = self.links.get(url).cloned().unwrap_or_default();
        Ok(Box::new(StaticDocument(links)))
    }
}

fn options(urls: &[&str], depth: usize) -> CrawlOptions {
    CrawlOptions {
        urls: urls.iter().map(|u| u.to_string()).collect(),
        depth,
        ..CrawlOptions::default()
    }
}

// ============================================================================
// Orchestration Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_seed_gets_its_own_result() {
    let fetcher = Arc::new(
        SiteFetcher::default()
            .link("http://one/", &["http://one/a"])
            .link("http://two/", &["http://two/b", "http://two/missing"]),
    );

    let crawls = execute_crawl_with(fetcher, options(&["http://one/", "http://two/"], 2), None)
        .await
        .unwrap();

    assert_eq!(crawls.len(), 2);
    assert_eq!(crawls[0].seed, "http://one/");
    assert_eq!(crawls[0].result.downloaded, vec!["http://one/", "http://one/a"]);
    assert!(!crawls[0].result.has_errors());

    assert_eq!(crawls[1].seed, "http://two/");
    assert_eq!(crawls[1].result.downloaded, vec!["http://two/", "http://two/b"]);
    assert!(crawls[1].result.errors.contains_key("http://two/missing"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_per_host_limit_spans_seeds() {
    let children: Vec<String> = (0..8).map(|i| format!("http://same/p{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
    let fetcher = Arc::new(
        SiteFetcher::default()
            .link("http://same/a", &child_refs)
            .link("http://same/b", &child_refs),
    );

    let crawl_options = CrawlOptions {
        downloaders: 6,
        per_host: Some(1),
        ..options(&["http://same/a", "http://same/b"], 2)
    };
    let crawls = execute_crawl_with(fetcher.clone(), crawl_options, None)
        .await
        .unwrap();

    assert_eq!(crawls.len(), 2);
    assert_eq!(crawls[0].result.downloaded.len(), 9);
    assert_eq!(crawls[1].result.downloaded.len(), 9);
    assert_eq!(fetcher.peak_for("same"), 1);
}

#[tokio::test]
async fn test_failed_seed_is_reported_and_skipped() {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let messages_clone = messages.clone();
    let callback: CrawlProgressCallback =
        Arc::new(move |msg: String| messages_clone.lock().unwrap().push(msg));

    let crawls = execute_crawl_with(
        Arc::new(SiteFetcher::default()),
        options(&["http://ok/", "http://other/"], 0),
        Some(callback),
    )
    .await
    .unwrap();

    // Depth zero is rejected for every seed
    assert!(crawls.is_empty());
    let messages = messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.contains("Failed to crawl http://ok/")));
    assert!(messages.iter().any(|m| m.contains("Failed to crawl http://other/")));
}

#[tokio::test]
async fn test_empty_url_list_is_an_error() {
    let result = execute_crawl_with(Arc::new(SiteFetcher::default()), options(&[], 1), None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_invalid_counts_are_an_error() {
    let crawl_options = CrawlOptions {
        extractors: 0,
        ..options(&["http://one/"], 1)
    };
    let result = execute_crawl_with(Arc::new(SiteFetcher::default()), crawl_options, None).await;
    assert!(result.is_err());
}

// ============================================================================
// URL Path Extraction Tests
// ============================================================================

#[test]
fn test_extract_url_path_root() {
    assert_eq!(extract_url_path("http://example.com/"), "/");
}

#[test]
fn test_extract_url_path_empty_path() {
    assert_eq!(extract_url_path("http://example.com"), "/");
}

#[test]
fn test_extract_url_path_nested() {
    assert_eq!(
        extract_url_path("http://example.com/api/v1/users"),
        "/api/v1/users"
    );
}

#[test]
fn test_extract_url_path_with_query_and_fragment() {
    assert_eq!(extract_url_path("http://example.com/api?key=value#top"), "/api");
}

#[test]
fn test_extract_url_path_with_port() {
    assert_eq!(extract_url_path("http://example.com:8080/api"), "/api");
}

#[test]
fn test_extract_url_path_with_trailing_slash() {
    assert_eq!(extract_url_path("http://example.com/api/"), "/api/");
}

#[test]
fn test_extract_url_path_invalid_url() {
    assert_eq!(extract_url_path("not a url"), "not a url");
}
