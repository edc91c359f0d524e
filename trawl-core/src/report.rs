// Report generation from crawl results

use crate::crawl::{SeedCrawl, extract_url_path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use url::Url;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("JSON rendering failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV rendering failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV buffer could not be flushed: {0}")]
    Flush(#[from] std::io::Error),

    #[error("report is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub generated_at: String,
    pub seeds: Vec<String>,
    pub downloaded: Vec<String>,
    pub errors: Vec<ErrorEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub pending: Vec<String>,
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Totals {
    pub downloaded: usize,
    pub errors: usize,
    pub pending: usize,
    pub hosts: usize,
}

impl ReportData {
    /// Merges the per-seed results. A URL reached from several seeds is
    /// listed once.
    pub fn from_crawls(crawls: &[SeedCrawl]) -> Self {
        let mut downloaded = Vec::new();
        let mut errors = BTreeMap::new();
        let mut pending = Vec::new();

        for crawl in crawls {
            downloaded.extend(crawl.result.downloaded.iter().cloned());
            errors.extend(crawl.result.error_messages());
            pending.extend(crawl.result.pending.iter().cloned());
        }

        downloaded.sort();
        downloaded.dedup();
        pending.sort();
        pending.dedup();

        let errors: Vec<ErrorEntry> = errors
            .into_iter()
            .map(|(url, message)| ErrorEntry { url, message })
            .collect();

        let hosts = group_by_host(&downloaded).len();
        let totals = Totals {
            downloaded: downloaded.len(),
            errors: errors.len(),
            pending: pending.len(),
            hosts,
        };

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            seeds: crawls.iter().map(|c| c.seed.clone()).collect(),
            downloaded,
            errors,
            pending,
            totals,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String, ReportError> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => Ok(generate_json_report(data)?),
        ReportFormat::Csv => generate_csv_report(data),
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                            TRAWL CRAWL REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Generated:    {}\n", data.generated_at));
    report.push_str(&format!("Targets:      {}\n", format_targets(&data.seeds)));
    report.push_str(&format!("Downloaded:   {}\n", data.totals.downloaded));
    report.push_str(&format!("Errors:       {}\n", data.totals.errors));
    if data.totals.pending > 0 {
        report.push_str(&format!("Pending:      {}\n", data.totals.pending));
    }
    report.push('\n');

    report.push_str(RULE);
    report.push_str("DOWNLOADED\n");
    report.push_str(RULE);
    report.push('\n');

    if data.downloaded.is_empty() {
        report.push_str("  (none)\n\n");
    }
    for (host, urls) in group_by_host(&data.downloaded) {
        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages\n\n", urls.len()));
        for url in urls {
            report.push_str(&format!("  {}\n", extract_url_path(url)));
        }
        report.push('\n');
    }

    if !data.errors.is_empty() {
        report.push_str(RULE);
        report.push_str("ERRORS\n");
        report.push_str(RULE);
        report.push('\n');
        for entry in &data.errors {
            report.push_str(&format!("  {}\n    {}\n", entry.url, entry.message));
        }
        report.push('\n');
    }

    if !data.pending.is_empty() {
        report.push_str(RULE);
        report.push_str("PENDING (timed out)\n");
        report.push_str(RULE);
        report.push('\n');
        for url in &data.pending {
            report.push_str(&format!("  {}\n", url));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                              End of Report\n");
    report.push_str(RULE);

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Trawl",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": data.generated_at,
                "format": "json"
            },
            "targets": data.seeds,
            "summary": data.totals,
            "downloaded": data.downloaded,
            "errors": data.errors,
            "pending": data.pending
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// One row per URL: `url,status,detail`.
pub fn generate_csv_report(data: &ReportData) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["url", "status", "detail"])?;

    for url in &data.downloaded {
        writer.write_record([url.as_str(), "downloaded", ""])?;
    }
    for entry in &data.errors {
        writer.write_record([entry.url.as_str(), "error", entry.message.as_str()])?;
    }
    for url in &data.pending {
        writer.write_record([url.as_str(), "pending", ""])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(e.error().kind(), e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::from("# Trawl Crawl Report\n\n");

    report.push_str(&format!("- **Generated:** {}\n", data.generated_at));
    report.push_str(&format!("- **Targets:** {}\n", format_targets(&data.seeds)));
    report.push_str(&format!("- **Downloaded:** {}\n", data.totals.downloaded));
    report.push_str(&format!("- **Errors:** {}\n", data.totals.errors));
    if data.totals.pending > 0 {
        report.push_str(&format!("- **Pending:** {}\n", data.totals.pending));
    }

    report.push_str("\n## Downloaded\n\n");
    for (host, urls) in group_by_host(&data.downloaded) {
        report.push_str(&format!("### {}\n\n", host));
        for url in urls {
            report.push_str(&format!("- `{}`\n", extract_url_path(url)));
        }
        report.push('\n');
    }

    if !data.errors.is_empty() {
        report.push_str("## Errors\n\n| URL | Error |\n|---|---|\n");
        for entry in &data.errors {
            report.push_str(&format!(
                "| {} | {} |\n",
                entry.url,
                entry.message.replace('|', "\\|")
            ));
        }
        report.push('\n');
    }

    if !data.pending.is_empty() {
        report.push_str("## Pending\n\n");
        for url in &data.pending {
            report.push_str(&format!("- {}\n", url));
        }
        report.push('\n');
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

// Helper functions

fn group_by_host(urls: &[String]) -> BTreeMap<String, Vec<&String>> {
    let mut by_host: BTreeMap<String, Vec<&String>> = BTreeMap::new();
    for url in urls {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        by_host.entry(host).or_default().push(url);
    }
    by_host
}

fn format_targets(seeds: &[String]) -> String {
    match seeds {
        [] => "None".to_string(),
        [seed] => seed.clone(),
        _ => format!("{} URLs", seeds.len()),
    }
}
