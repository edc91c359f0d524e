//! Fixed-size worker pools.
//!
//! Each pool owns a set of tokio tasks that pull jobs off one unbounded
//! queue. Admission is already bounded upstream by the host gates, so the
//! queue itself never needs back-pressure.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A unit of work a [`WorkerPool`] can run.
pub trait Job: Send + 'static {
    fn run(self) -> impl Future<Output = ()> + Send;
}

pub struct WorkerPool<J: Job> {
    name: &'static str,
    sender: mpsc::UnboundedSender<J>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

impl<J: Job> WorkerPool<J> {
    /// Spawns `size` workers on the current tokio runtime.
    pub fn new(name: &'static str, size: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let shutdown = shutdown.subscribe();
                tokio::spawn(work(name, worker_id, receiver, shutdown))
            })
            .collect();

        Self {
            name,
            sender,
            shutdown,
            closed: AtomicBool::new(false),
            workers: StdMutex::new(workers),
        }
    }

    /// Queues a job. A closed pool hands the job back untouched.
    pub fn submit(&self, job: J) -> Result<(), J> {
        if self.is_closed() {
            return Err(job);
        }
        self.sender.send(job).map_err(|rejected| rejected.0)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops accepting jobs and tells idle workers to exit. Workers finish
    /// the job they are running first.
    pub fn signal_shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Shutting down {} pool", self.name);
            self.shutdown.send_replace(true);
        }
    }

    /// Signals shutdown and waits for every worker to exit. Jobs still queued
    /// are dropped once the last worker is gone.
    pub async fn shutdown(&self) {
        self.signal_shutdown();
        let workers: Vec<_> = {
            let mut guard = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for joined in join_all(workers).await {
            if let Err(e) = joined {
                error!("{} worker ended abnormally: {}", self.name, e);
            }
        }
    }
}

impl<J: Job> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

async fn work<J: Job>(
    name: &'static str,
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<J>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("{} worker {} started", name, worker_id);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let job = {
            let mut queue = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.changed() => None,
                job = queue.recv() => job,
            }
        };

        let Some(job) = job else {
            break;
        };

        if AssertUnwindSafe(job.run()).catch_unwind().await.is_err() {
            error!("{} worker {} caught a panicking job", name, worker_id);
        }
    }

    debug!("{} worker {} finished", name, worker_id);
}
