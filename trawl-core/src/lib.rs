pub mod crawl;
pub mod report;

pub use crawl::{CrawlOptions, CrawlProgressCallback, SeedCrawl, execute_crawl, execute_crawl_with};
pub use report::{ReportData, ReportError, ReportFormat, generate_report, save_report};
