use crate::error::ScanError;
use std::collections::{BTreeMap, HashMap};

/// Outcome of one `Crawler::download` call.
///
/// A URL that was fetched but whose links could not be extracted shows up
/// in both `downloaded` and `errors`.
#[derive(Debug, Default)]
pub struct CrawlResult {
    /// Successfully fetched URLs, sorted.
    pub downloaded: Vec<String>,
    /// Failed URLs mapped to the error that stopped them.
    pub errors: HashMap<String, ScanError>,
    /// URLs still in flight when the download stopped waiting. Empty unless
    /// a download timeout fired.
    pub pending: Vec<String>,
}

impl CrawlResult {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Error descriptions keyed by URL, in URL order.
    pub fn error_messages(&self) -> BTreeMap<String, String> {
        self.errors
            .iter()
            .map(|(url, error)| (url.clone(), error.to_string()))
            .collect()
    }
}
