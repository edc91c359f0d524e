use crate::config::CrawlerConfig;
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Downloads pages for a [`Crawler`](crate::Crawler). Called concurrently
/// from every fetch worker.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Box<dyn Document>>;
}

/// A fetched page. Link extraction runs on a blocking thread, so it may do
/// CPU-heavy parsing.
pub trait Document: Send + 'static {
    fn extract_links(&self) -> Result<Vec<String>>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let timeout = config.request_timeout;
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .http2_adaptive_window(true)
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Box<dyn Document>> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        Ok(Box::new(HtmlDocument::new(url, content_type, body)))
    }
}

pub struct HtmlDocument {
    url: String,
    content_type: Option<String>,
    body: String,
}

impl HtmlDocument {
    pub fn new(url: impl Into<String>, content_type: Option<String>, body: String) -> Self {
        Self {
            url: url.into(),
            content_type,
            body,
        }
    }

    /// Bodies without a content type are treated as HTML.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_ref()
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            .unwrap_or(true)
    }
}

impl Document for HtmlDocument {
    fn extract_links(&self) -> Result<Vec<String>> {
        if !self.is_html() {
            return Ok(Vec::new());
        }

        let base = Url::parse(&self.url)
            .map_err(|e| ScanError::ParseError(format!("Bad base URL {}: {}", self.url, e)))?;
        let selector = Selector::parse("a[href]")
            .map_err(|e| ScanError::ParseError(format!("Bad selector: {}", e)))?;

        let document = Html::parse_document(&self.body);
        let links = document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .filter_map(|href| resolve_url(&base, href))
            .collect();

        Ok(links)
    }
}

fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    // Skip empty, javascript:, mailto:, tel:, and in-page anchors
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    url.set_fragment(None);

    Some(url.to_string())
}
