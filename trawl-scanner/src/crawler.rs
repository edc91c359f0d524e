use crate::config::{CrawlerConfig, ProgressCallback};
use crate::error::{Result, ScanError};
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::host_gate::{HostGate, host_of};
use crate::pool::WorkerPool;
use crate::result::CrawlResult;
use crate::session::{CrawlSession, ExtractTask, FetchTask, Ticket};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Breadth-first, depth-bounded crawler.
///
/// Fetches run on a pool of `downloaders` workers and never exceed
/// `per_host` at a time for any one host; link extraction runs on a
/// separate pool of `extractors` workers. Host limits are shared by every
/// `download` call made on the same crawler.
pub struct Crawler {
    engine: Arc<Engine>,
    timeout: Option<Duration>,
}

/// State shared between the crawler, its sessions and the running jobs.
pub(crate) struct Engine {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    fetch_pool: WorkerPool<FetchTask>,
    pub(crate) extract_pool: WorkerPool<ExtractTask>,
    gates: DashMap<String, Arc<HostGate<FetchTask>>>,
    per_host: usize,
    progress: Option<ProgressCallback>,
    closed: AtomicBool,
}

impl Crawler {
    /// Spawns the worker pools on the current tokio runtime. Fails with
    /// `InvalidArgument` when called outside of one.
    pub fn new(fetcher: Arc<dyn Fetcher>, config: CrawlerConfig) -> Result<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|e| {
            ScanError::InvalidArgument(format!("Crawler must be created inside a tokio runtime: {}", e))
        })?;
        debug!("Creating crawler with {:?}", config);

        let engine = Engine {
            fetcher,
            fetch_pool: WorkerPool::new("fetch", config.downloaders),
            extract_pool: WorkerPool::new("extract", config.extractors),
            gates: DashMap::new(),
            per_host: config.per_host,
            progress: config.progress,
            closed: AtomicBool::new(false),
        };

        Ok(Self {
            engine: Arc::new(engine),
            timeout: config.timeout,
        })
    }

    /// Builds a crawler that downloads over HTTP.
    pub fn http(config: CrawlerConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::new(Arc::new(fetcher), config)
    }

    /// Crawls from `seed`, following links up to `max_depth - 1` hops.
    /// `max_depth == 1` fetches only the seed.
    ///
    /// Per-URL failures are returned inside the [`CrawlResult`]; this only
    /// errors on a zero depth or a closed crawler.
    pub async fn download(&self, seed: &str, max_depth: usize) -> Result<CrawlResult> {
        if max_depth == 0 {
            return Err(ScanError::InvalidArgument(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.is_closed() {
            return Err(ScanError::ShutDown);
        }

        info!("Starting crawl of {} with max depth {}", seed, max_depth);

        let session = CrawlSession::new(self.engine.clone());
        // Nothing new starts for this session once the caller stops waiting.
        let _abandon = session.abandon_on_drop();
        session.discover(seed.to_string(), max_depth - 1);

        match self.timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, session.settled()).await.is_err() {
                    warn!("Crawl of {} timed out after {:?}", seed, limit);
                }
            }
            None => session.settled().await,
        }

        let visited = session.visited_count();
        let result = session.snapshot();
        info!(
            "Crawl of {} complete. Visited {} URLs: {} downloaded, {} errors, {} pending",
            seed,
            visited,
            result.downloaded.len(),
            result.errors.len(),
            result.pending.len()
        );
        Ok(result)
    }

    /// Stops both pools and cancels queued work. Downloads still waiting
    /// return with their unfinished URLs recorded as cancelled.
    pub async fn close(&self) {
        self.engine.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.engine.closed.load(Ordering::Acquire)
    }

    /// Number of hosts that have a gate.
    pub fn host_count(&self) -> usize {
        self.engine.gates.len()
    }
}

impl Drop for Crawler {
    fn drop(&mut self) {
        self.engine.signal_close();
        // Queued tasks hold their session, which holds the engine.
        self.engine.cancel_queued();
    }
}

impl Engine {
    /// Routes a ticket through its host's gate onto the fetch pool.
    pub(crate) fn dispatch(&self, mut ticket: Ticket, remaining: usize) {
        if self.closed.load(Ordering::Acquire) {
            ticket.fail(ScanError::ShutDown);
            return;
        }

        let host = match host_of(ticket.url()) {
            Ok(host) => host,
            Err(e) => {
                ticket.fail(e);
                return;
            }
        };

        let gate = self.gate(&host);
        let task = FetchTask::new(ticket, remaining, gate.clone());

        match gate.submit(task) {
            Some(task) => self.hand_off(&gate, task),
            None => debug!("Host {} is busy, queued ({} waiting)", host, gate.queued()),
        }
    }

    /// Returns a slot to `gate`, starting the next queued fetch if any.
    pub(crate) fn release(&self, gate: &HostGate<FetchTask>) {
        if let Some(next) = gate.release() {
            self.hand_off(gate, next);
        }
    }

    pub(crate) fn report_progress(&self, url: &str) {
        if let Some(ref callback) = self.progress {
            callback(url.to_string());
        }
    }

    /// Runs a task just admitted to a slot of `gate`. If the pool refuses
    /// it, the slot passes on and refused tasks settle as cancelled.
    fn hand_off(&self, gate: &HostGate<FetchTask>, task: FetchTask) {
        let mut task = task;
        loop {
            task.claim_slot();
            match self.fetch_pool.submit(task) {
                Ok(()) => return,
                Err(mut refused) => {
                    // Passed on below, iteratively, not from the guard.
                    refused.forfeit_slot();
                    drop(refused);
                    match gate.release() {
                        Some(next) => task = next,
                        None => return,
                    }
                }
            }
        }
    }

    fn gate(&self, host: &str) -> Arc<HostGate<FetchTask>> {
        self.gates
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(HostGate::new(host, self.per_host)))
            .clone()
    }

    fn signal_close(&self) {
        self.closed.store(true, Ordering::Release);
        self.fetch_pool.signal_shutdown();
        self.extract_pool.signal_shutdown();
    }

    async fn close(&self) {
        info!("Closing crawler");
        self.signal_close();
        self.fetch_pool.shutdown().await;
        self.extract_pool.shutdown().await;
        self.cancel_queued();
    }

    fn cancel_queued(&self) {
        let abandoned: Vec<FetchTask> = self
            .gates
            .iter()
            .flat_map(|gate| gate.value().drain())
            .collect();
        if !abandoned.is_empty() {
            debug!("Cancelling {} queued fetches", abandoned.len());
        }
        // Dropping the tasks settles their tickets as cancelled.
        drop(abandoned);
    }
}
