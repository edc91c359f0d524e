// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    EXIT_OK, EXIT_URL_ERRORS, EXIT_USAGE, exit_status, handle_crawl, load_urls_from_file,
    load_urls_from_source, parse_url_line, print_banner,
};

// Re-export crawl functionality from trawl-core
pub use trawl_core::crawl::{CrawlOptions, CrawlProgressCallback, execute_crawl, extract_url_path};
