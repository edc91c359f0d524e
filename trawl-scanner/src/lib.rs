pub mod config;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod host_gate;
pub mod pool;
pub mod result;
mod session;

pub use config::{CrawlerConfig, ProgressCallback};
pub use crawler::Crawler;
pub use error::ScanError;
pub use fetcher::{Document, Fetcher, HtmlDocument, HttpFetcher};
pub use host_gate::host_of;
pub use result::CrawlResult;
