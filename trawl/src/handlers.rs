use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use trawl_core::crawl::{CrawlOptions, CrawlProgressCallback, SeedCrawl, execute_crawl};
use trawl_core::report::{ReportData, ReportFormat, generate_report, save_report};
use url::Url;

/// Exit status when every URL was downloaded
pub const EXIT_OK: u8 = 0;
/// Exit status when the crawl finished but some URLs failed or timed out
pub const EXIT_URL_ERRORS: u8 = 1;
/// Exit status for usage and setup errors (matches clap's own)
pub const EXIT_USAGE: u8 = 2;

// Helper functions for crawl handler

/// Collect seeds from the URL argument and/or a hosts file, in that order,
/// without duplicates.
pub fn load_urls_from_source(
    url: Option<&str>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    let mut urls = Vec::new();

    if let Some(url) = url {
        match parse_url_line(url.trim()) {
            Some(url) => urls.push(url),
            None => return Err(format!("Invalid URL '{}'", url)),
        }
    }
    if let Some(hosts_file_path) = hosts_file {
        urls.extend(load_urls_from_file(hosts_file_path)?);
    }

    if urls.is_empty() {
        return Err("Either a URL or --hosts-file must be provided".to_string());
    }

    let mut seen = std::collections::HashSet::new();
    urls.retain(|url| seen.insert(url.clone()));
    Ok(urls)
}

/// Load and parse URLs from a file. A leading `~` is expanded.
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let content = fs::read_to_string(&expanded)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    // Try to parse as-is
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(line.to_string());
    }

    // Try adding http://
    let with_scheme = format!("http://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.has_host()
    {
        return Some(with_scheme);
    }

    eprintln!("{}  Skipping invalid URL '{}'", "⚠️".yellow(), line);
    None
}

/// Exit status for a finished crawl
pub fn exit_status(data: &ReportData) -> u8 {
    if data.has_errors() || !data.pending.is_empty() {
        EXIT_URL_ERRORS
    } else {
        EXIT_OK
    }
}

pub fn print_banner() {
    eprintln!(
        "{}",
        r#"
  _                     _
 | |_ _ __ __ ___      _| |
 | __| '__/ _` \ \ /\ / / |
 | |_| | | (_| |\ V  V /| |
  \__|_|  \__,_| \_/\_/ |_|
"#
        .bright_cyan()
        .bold()
    );
    eprintln!(
        "  {} {}\n",
        "trawl".bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
}

fn print_divider() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}

fn count_arg(args: &ArgMatches, name: &str) -> Option<usize> {
    args.get_one::<u64>(name).map(|n| *n as usize)
}

fn crawl_options(args: &ArgMatches, urls: Vec<String>, quiet: bool) -> CrawlOptions {
    CrawlOptions {
        urls,
        depth: count_arg(args, "DEPTH").unwrap_or(1),
        downloaders: count_arg(args, "DOWNLOADERS").unwrap_or(1),
        extractors: count_arg(args, "EXTRACTORS").unwrap_or(1),
        per_host: count_arg(args, "PER_HOST"),
        timeout: args.get_one::<u64>("timeout").map(|s| Duration::from_secs(*s)),
        request_timeout: args
            .get_one::<u64>("request-timeout")
            .map(|s| Duration::from_secs(*s)),
        show_progress: !quiet,
    }
}

fn print_configuration(options: &CrawlOptions) {
    print_divider();
    eprintln!(
        "{} Crawling {} seed(s)",
        "🕷️ ".bright_cyan(),
        options.urls.len().to_string().bold()
    );
    eprintln!("  Max depth:    {}", options.depth);
    eprintln!("  Downloaders:  {}", options.downloaders);
    eprintln!("  Extractors:   {}", options.extractors);
    eprintln!(
        "  Per host:     {}",
        options
            .per_host
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );
    if let Some(timeout) = options.timeout {
        eprintln!("  Timeout:      {}s", timeout.as_secs());
    }
    print_divider();
}

fn print_summary(crawls: &[SeedCrawl], data: &ReportData) {
    for crawl in crawls {
        let result = &crawl.result;
        let marker = if result.has_errors() {
            "✗".red().bold()
        } else {
            "✓".green().bold()
        };
        eprintln!(
            "{} {}  {} downloaded, {} errors{}",
            marker,
            crawl.seed.bold(),
            result.downloaded.len().to_string().green(),
            result.errors.len().to_string().red(),
            if result.pending.is_empty() {
                String::new()
            } else {
                format!(", {} pending", result.pending.len().to_string().yellow())
            }
        );
    }

    for entry in &data.errors {
        eprintln!("  {} {}: {}", "✗".red(), entry.url, entry.message.dimmed());
    }
    for url in &data.pending {
        eprintln!("  {} {} (timed out)", "…".yellow(), url);
    }
}

/// Runs the `crawl` subcommand and returns the process exit status.
pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> anyhow::Result<u8> {
    let url = args.get_one::<String>("URL").map(String::as_str);
    let hosts_file = args.get_one::<PathBuf>("hosts-file");
    let format_name = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let Some(format) = ReportFormat::from_str(format_name) else {
        bail!("Unknown report format '{}'", format_name);
    };

    let urls = load_urls_from_source(url, hosts_file).map_err(anyhow::Error::msg)?;
    let options = crawl_options(args, urls, quiet);

    if !quiet {
        print_configuration(&options);
    }

    let progress_callback = if quiet {
        None
    } else {
        let callback: CrawlProgressCallback = Arc::new(|msg: String| eprintln!("{}", msg));
        Some(callback)
    };

    let crawls = execute_crawl(options, progress_callback)
        .await
        .map_err(|e| anyhow::anyhow!("Crawl failed: {}", e))?;

    let data = ReportData::from_crawls(&crawls);
    let report = generate_report(&data, format).context("Failed to render report")?;

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(&report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                eprintln!("{} Report saved to {}", "✓".green().bold(), path.display());
            }
        }
        None => print!("{}", report),
    }

    if !quiet {
        eprintln!();
        print_summary(&crawls, &data);
    }

    Ok(exit_status(&data))
}
