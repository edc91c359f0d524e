use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;
use trawl_scanner::{CrawlResult, Crawler, CrawlerConfig, Fetcher, HttpFetcher};
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub depth: usize,
    pub downloaders: usize,
    pub extractors: usize,
    /// `None` leaves hosts unbounded
    pub per_host: Option<usize>,
    pub timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub show_progress: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            depth: 1,
            downloaders: 1,
            extractors: 1,
            per_host: None,
            timeout: None,
            request_timeout: None,
            show_progress: false,
        }
    }
}

impl CrawlOptions {
    fn crawler_config(&self) -> CrawlerConfig {
        let mut config = CrawlerConfig::new()
            .with_downloaders(self.downloaders)
            .with_extractors(self.extractors);
        if let Some(per_host) = self.per_host {
            config = config.with_per_host(per_host);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(request_timeout) = self.request_timeout {
            config = config.with_request_timeout(request_timeout);
        }
        config
    }
}

/// Outcome of crawling one seed
#[derive(Debug)]
pub struct SeedCrawl {
    pub seed: String,
    pub result: CrawlResult,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Execute a crawl over HTTP with the given options
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<Vec<SeedCrawl>, String> {
    let config = options.crawler_config();
    let fetcher = HttpFetcher::new(&config).map_err(|e| e.to_string())?;
    execute_crawl_with(Arc::new(fetcher), options, progress_callback).await
}

/// Execute a crawl with a caller-supplied fetcher.
///
/// All seeds share one crawler, so the per-host limit holds across them.
/// Seeds that cannot be crawled at all are reported through
/// `progress_callback` and left out of the returned list.
pub async fn execute_crawl_with(
    fetcher: Arc<dyn Fetcher>,
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<Vec<SeedCrawl>, String> {
    if options.urls.is_empty() {
        return Err("No URLs to crawl".to_string());
    }

    // Set up single spinner for overall crawl progress (only if enabled)
    let progress_bar = if options.show_progress {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .map_err(|e| e.to_string())?;
        pb.set_style(style);
        pb.set_message("Starting crawl...");
        Some(pb)
    } else {
        None
    };

    // Counter for fetches started across every seed
    let processed_count = Arc::new(AtomicUsize::new(0));

    let mut config = options.crawler_config();
    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let count_clone = processed_count.clone();
        config = config.with_progress_callback(Arc::new(move |url: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!("Crawling... {} URLs fetched ({})", count, url));
            pb_clone.tick();
        }));
    }

    let crawler = Crawler::new(fetcher, config).map_err(|e| e.to_string())?;

    let CrawlOptions { urls, depth, .. } = options;
    info!("Crawling {} seed(s) to depth {}", urls.len(), depth);

    let total = urls.len();
    let crawls = urls.iter().enumerate().map(|(idx, seed)| {
        if let Some(ref callback) = progress_callback
            && total > 1
        {
            callback(format!("Crawling host {}/{}: {}", idx + 1, total, seed));
        }
        crawler.download(seed, depth)
    });
    let outcomes = join_all(crawls).await;

    crawler.close().await;

    let mut results = Vec::with_capacity(total);
    for (seed, outcome) in urls.into_iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(SeedCrawl { seed, result }),
            Err(e) => {
                if let Some(ref callback) = progress_callback {
                    callback(format!("[!]  Failed to crawl {}: {}", seed, e));
                }
            }
        }
    }

    // Finish spinner (only if enabled)
    if let Some(ref pb) = progress_bar {
        let total = processed_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} URLs fetched", total));
    }

    Ok(results)
}
