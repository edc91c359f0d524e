use crate::error::{Result, ScanError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Trawl/0.1 (https://github.com/trapdoorsec/trawl)";

/// Called with each URL as its fetch starts.
pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Settings for a [`Crawler`](crate::Crawler). Thread counts only affect
/// throughput, never which pages end up in the result.
#[derive(Clone)]
pub struct CrawlerConfig {
    pub downloaders: usize,
    pub extractors: usize,
    /// Concurrent fetches allowed per host. `usize::MAX` means unbounded.
    pub per_host: usize,
    /// Upper bound on a whole `download` call.
    pub timeout: Option<Duration>,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub progress: Option<ProgressCallback>,
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self {
            downloaders: 1,
            extractors: 1,
            per_host: usize::MAX,
            timeout: None,
            request_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            progress: None,
        }
    }

    pub fn with_downloaders(mut self, downloaders: usize) -> Self {
        self.downloaders = downloaders;
        self
    }

    pub fn with_extractors(mut self, extractors: usize) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_per_host(mut self, per_host: usize) -> Self {
        self.per_host = per_host;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn is_host_bounded(&self) -> bool {
        self.per_host != usize::MAX
    }

    pub fn validate(&self) -> Result<()> {
        if self.downloaders == 0 {
            return Err(ScanError::InvalidArgument(
                "downloaders must be at least 1".to_string(),
            ));
        }
        if self.extractors == 0 {
            return Err(ScanError::InvalidArgument(
                "extractors must be at least 1".to_string(),
            ));
        }
        if self.per_host == 0 {
            return Err(ScanError::InvalidArgument(
                "per_host must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CrawlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlerConfig")
            .field("downloaders", &self.downloaders)
            .field("extractors", &self.extractors)
            .field("per_host", &self.per_host)
            .field("timeout", &self.timeout)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
