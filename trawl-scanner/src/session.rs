//! One `download` call: visited set, result accumulators and the
//! completion barrier, plus the job records that flow through the pools.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashSet;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::crawler::Engine;
use crate::error::ScanError;
use crate::fetcher::Document;
use crate::host_gate::HostGate;
use crate::pool::Job;
use crate::result::CrawlResult;

pub(crate) struct CrawlSession {
    engine: Arc<Engine>,
    visited: DashSet<String>,
    in_flight: DashSet<String>,
    downloaded: Mutex<Vec<String>>,
    errors: Mutex<HashMap<String, ScanError>>,
    outstanding: watch::Sender<usize>,
    abandoned: AtomicBool,
}

impl CrawlSession {
    pub(crate) fn new(engine: Arc<Engine>) -> Arc<Self> {
        let (outstanding, _) = watch::channel(0);
        Arc::new(Self {
            engine,
            visited: DashSet::new(),
            in_flight: DashSet::new(),
            downloaded: Mutex::new(Vec::new()),
            errors: Mutex::new(HashMap::new()),
            outstanding,
            abandoned: AtomicBool::new(false),
        })
    }

    /// Claims `url` for this session and dispatches it. Returns false when
    /// the URL was already seen or the session was abandoned.
    pub(crate) fn discover(self: &Arc<Self>, url: String, remaining: usize) -> bool {
        if self.is_abandoned() || !self.visited.insert(url.clone()) {
            return false;
        }
        let ticket = Ticket::issue(self.clone(), url);
        self.engine.dispatch(ticket, remaining);
        true
    }

    /// Marks the session as no longer awaited. Nothing new is dispatched
    /// and queued fetches settle as cancelled without running.
    pub(crate) fn abandon(&self) {
        if !self.abandoned.swap(true, Ordering::AcqRel) {
            debug!("Session abandoned with {} URLs in flight", self.in_flight.len());
        }
    }

    pub(crate) fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    /// Abandons the session when the returned guard is dropped, including
    /// when the awaiting future is dropped mid-crawl.
    pub(crate) fn abandon_on_drop(self: &Arc<Self>) -> AbandonGuard {
        AbandonGuard(self.clone())
    }

    /// Resolves once every issued ticket has settled.
    pub(crate) async fn settled(&self) {
        let mut outstanding = self.outstanding.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = outstanding.wait_for(|count| *count == 0).await;
    }

    pub(crate) fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Takes the accumulated outcome. Results that land afterwards are
    /// discarded.
    pub(crate) fn snapshot(&self) -> CrawlResult {
        // Both guards are held while reading `in_flight` so a URL never shows
        // up as finished and pending at once.
        let mut downloaded_guard = lock(&self.downloaded);
        let mut errors_guard = lock(&self.errors);
        let mut downloaded = std::mem::take(&mut *downloaded_guard);
        let errors = std::mem::take(&mut *errors_guard);
        let mut pending: Vec<String> = self.in_flight.iter().map(|url| url.key().clone()).collect();
        drop(errors_guard);
        drop(downloaded_guard);

        downloaded.sort();
        pending.sort();

        CrawlResult {
            downloaded,
            errors,
            pending,
        }
    }

    fn record_downloaded(&self, url: &str) {
        let mut downloaded = lock(&self.downloaded);
        self.in_flight.remove(url);
        downloaded.push(url.to_string());
    }

    fn record_error(&self, url: &str, error: ScanError) {
        warn!("Crawl error for {}: {}", url, error);
        let mut errors = lock(&self.errors);
        self.in_flight.remove(url);
        errors.insert(url.to_string(), error);
    }
}

pub(crate) struct AbandonGuard(Arc<CrawlSession>);

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One unit of outstanding session work. Issuing a ticket bumps the
/// session's counter; dropping it settles the unit. A ticket dropped before
/// any outcome was recorded counts as cancelled.
pub(crate) struct Ticket {
    session: Arc<CrawlSession>,
    url: String,
    settled: bool,
}

impl Ticket {
    fn issue(session: Arc<CrawlSession>, url: String) -> Self {
        session.outstanding.send_modify(|count| *count += 1);
        session.in_flight.insert(url.clone());
        Self {
            session,
            url,
            settled: false,
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn session(&self) -> &Arc<CrawlSession> {
        &self.session
    }

    pub(crate) fn downloaded(&mut self) {
        self.session.record_downloaded(&self.url);
        self.settled = true;
    }

    pub(crate) fn fail(&mut self, error: ScanError) {
        self.session.record_error(&self.url, error);
        self.settled = true;
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.settled {
            self.session.record_error(&self.url, ScanError::Cancelled);
        }
        self.session.outstanding.send_modify(|count| *count -= 1);
    }
}

/// Fetch a URL on the fetch pool. Owns a slot of `gate` from admission
/// until it is dropped.
pub(crate) struct FetchTask {
    ticket: Ticket,
    remaining: usize,
    gate: Arc<HostGate<FetchTask>>,
    slot: Option<SlotRelease>,
}

impl FetchTask {
    pub(crate) fn new(ticket: Ticket, remaining: usize, gate: Arc<HostGate<FetchTask>>) -> Self {
        Self {
            ticket,
            remaining,
            gate,
            slot: None,
        }
    }

    /// Takes ownership of the gate slot this task was admitted with.
    pub(crate) fn claim_slot(&mut self) {
        let engine = self.ticket.session().engine.clone();
        self.slot = Some(SlotRelease {
            engine,
            gate: self.gate.clone(),
            armed: true,
        });
    }

    /// Gives the slot back to the caller, who passes it on to the gate.
    pub(crate) fn forfeit_slot(&mut self) {
        if let Some(mut slot) = self.slot.take() {
            slot.armed = false;
        }
    }
}

/// Extract links from a fetched page on the extract pool.
pub(crate) struct ExtractTask {
    ticket: Ticket,
    remaining: usize,
    document: Box<dyn Document>,
}

/// Releases a claimed host slot when dropped, including when the fetch
/// panics or the task never runs.
struct SlotRelease {
    engine: Arc<Engine>,
    gate: Arc<HostGate<FetchTask>>,
    armed: bool,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        if self.armed {
            self.engine.release(&self.gate);
        }
    }
}

impl Job for FetchTask {
    async fn run(self) {
        let FetchTask {
            mut ticket,
            remaining,
            slot: _slot,
            ..
        } = self;
        let session = ticket.session().clone();
        if session.is_abandoned() {
            ticket.fail(ScanError::Cancelled);
            return;
        }

        let engine = session.engine.clone();
        engine.report_progress(ticket.url());
        let fetched = engine.fetcher.fetch(ticket.url()).await;
        match fetched {
            Ok(document) => {
                debug!("Fetched {}", ticket.url());
                let task = ExtractTask {
                    ticket,
                    remaining,
                    document,
                };
                // A rejected task drops its ticket, which records the cancel.
                let _ = engine.extract_pool.submit(task);
            }
            Err(e) => ticket.fail(e),
        }
    }
}

impl Job for ExtractTask {
    async fn run(self) {
        let ExtractTask {
            mut ticket,
            remaining,
            document,
        } = self;

        if remaining > 0 && !ticket.session().is_abandoned() {
            let extracted = tokio::task::spawn_blocking(move || document.extract_links()).await;
            match extracted {
                Ok(Ok(links)) => {
                    let session = ticket.session().clone();
                    let discovered = links
                        .into_iter()
                        .filter(|link| session.discover(link.clone(), remaining - 1))
                        .count();
                    debug!("Extracted {} new links from {}", discovered, ticket.url());
                }
                Ok(Err(e)) => ticket.fail(e),
                Err(e) => ticket.fail(ScanError::JoinError(e)),
            }
        }

        ticket.downloaded();
    }
}
