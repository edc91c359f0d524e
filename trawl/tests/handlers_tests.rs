use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use trawl::handlers::*;
use trawl::{CrawlOptions, execute_crawl, extract_url_path};
use trawl_core::crawl::SeedCrawl;
use trawl_core::report::ReportData;
use trawl_scanner::{CrawlResult, ScanError};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://example.com");
    assert_eq!(result, Some("https://example.com".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    let result = parse_url_line("example.com");
    assert_eq!(result, Some("http://example.com".to_string()));
}

#[test]
fn test_parse_url_line_host_and_port() {
    let result = parse_url_line("localhost:8080/docs");
    assert_eq!(result, Some("http://localhost:8080/docs".to_string()));
}

#[test]
fn test_parse_url_line_invalid() {
    let result = parse_url_line("not a valid url!!!");
    assert_eq!(result, None);
}

#[test]
fn test_extract_url_path() {
    assert_eq!(
        extract_url_path("https://example.com/api/users"),
        "/api/users"
    );
    assert_eq!(extract_url_path("https://example.com/"), "/");
    assert_eq!(extract_url_path("https://example.com"), "/");
}

#[test]
fn test_load_urls_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://example.com")?;
    writeln!(temp_file, "httpbin.org")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "# a comment")?;
    writeln!(temp_file, "  https://api.example.com  ")?;

    let path = PathBuf::from(temp_file.path());
    let urls = load_urls_from_file(&path)?;

    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0], "https://example.com");
    assert_eq!(urls[1], "http://httpbin.org");
    assert_eq!(urls[2], "https://api.example.com");

    Ok(())
}

#[test]
fn test_load_urls_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let path = PathBuf::from(temp_file.path());
    let result = load_urls_from_file(&path);

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("No valid URLs"));
}

#[test]
fn test_load_urls_from_file_missing() {
    let result = load_urls_from_file(&PathBuf::from("/definitely/not/here.txt"));
    assert!(result.unwrap_err().contains("Failed to read hosts file"));
}

#[test]
fn test_load_urls_from_source_single_url() {
    let result = load_urls_from_source(Some("https://example.com/"), None).unwrap();
    assert_eq!(result, vec!["https://example.com/"]);
}

#[test]
fn test_load_urls_from_source_combines_and_dedups() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "https://example.com/").unwrap();
    writeln!(temp_file, "https://other.org/").unwrap();
    let path = PathBuf::from(temp_file.path());

    let result = load_urls_from_source(Some("https://example.com/"), Some(&path)).unwrap();

    assert_eq!(result, vec!["https://example.com/", "https://other.org/"]);
}

#[test]
fn test_load_urls_from_source_invalid_url() {
    let result = load_urls_from_source(Some("not a valid url!!!"), None);
    assert!(result.unwrap_err().contains("Invalid URL"));
}

#[test]
fn test_load_urls_from_source_no_input() {
    let result = load_urls_from_source(None, None);
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .contains("Either a URL or --hosts-file must be provided")
    );
}

#[test]
fn test_exit_status() {
    let clean = SeedCrawl {
        seed: "http://x/".to_string(),
        result: CrawlResult {
            downloaded: vec!["http://x/".to_string()],
            ..CrawlResult::default()
        },
    };
    assert_eq!(exit_status(&ReportData::from_crawls(&[clean])), EXIT_OK);

    let mut errors = HashMap::new();
    errors.insert("http://x/bad".to_string(), ScanError::Cancelled);
    let failed = SeedCrawl {
        seed: "http://x/".to_string(),
        result: CrawlResult {
            downloaded: vec!["http://x/".to_string()],
            errors,
            pending: Vec::new(),
        },
    };
    assert_eq!(exit_status(&ReportData::from_crawls(&[failed])), EXIT_URL_ERRORS);

    let timed_out = SeedCrawl {
        seed: "http://x/".to_string(),
        result: CrawlResult {
            pending: vec!["http://x/slow".to_string()],
            ..CrawlResult::default()
        },
    };
    assert_eq!(exit_status(&ReportData::from_crawls(&[timed_out])), EXIT_URL_ERRORS);
}

#[tokio::test]
async fn test_execute_crawl_over_http() {
    let mock_server = MockServer::start().await;
    let root = r#"<html><body><a href="/about">About</a><a href="/gone">Gone</a></body></html>"#;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(root),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<p>about</p>"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let seed = format!("{}/", mock_server.uri());
    let options = CrawlOptions {
        urls: vec![seed.clone()],
        depth: 2,
        downloaders: 2,
        per_host: Some(1),
        ..CrawlOptions::default()
    };

    let crawls = execute_crawl(options, None).await.unwrap();
    let data = ReportData::from_crawls(&crawls);

    assert_eq!(crawls.len(), 1);
    assert_eq!(data.downloaded, vec![seed.clone(), format!("{}about", seed)]);
    assert_eq!(data.errors.len(), 1);
    assert_eq!(data.errors[0].message, "HTTP status 404");
    assert_eq!(exit_status(&data), EXIT_URL_ERRORS);
}
