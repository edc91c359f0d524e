//! Per-host admission control.
//!
//! A gate hands out at most `capacity` slots for one host. Work that arrives
//! while every slot is taken waits in a FIFO queue, and a finishing task
//! passes its slot straight to the next queued one.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use url::Url;

use crate::error::{Result, ScanError};

/// Extracts the host component used to key [`HostGate`]s.
pub fn host_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ScanError::InvalidUrl(format!("{}: URL has no host", url)))
}

pub struct HostGate<T> {
    host: String,
    state: Mutex<GateState<T>>,
}

struct GateState<T> {
    available: usize,
    queue: VecDeque<T>,
}

impl<T> HostGate<T> {
    pub fn new(host: impl Into<String>, capacity: usize) -> Self {
        Self {
            host: host.into(),
            state: Mutex::new(GateState {
                available: capacity,
                queue: VecDeque::new(),
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Claims a slot for `task`. Returns the task back when it was admitted
    /// and should run now, `None` when it was queued behind running work.
    pub fn submit(&self, task: T) -> Option<T> {
        let mut state = self.lock();
        if state.available > 0 {
            state.available -= 1;
            Some(task)
        } else {
            state.queue.push_back(task);
            None
        }
    }

    /// Gives back a slot. If work is queued, the slot moves to the oldest
    /// queued task, which is returned for the caller to run.
    pub fn release(&self) -> Option<T> {
        let mut state = self.lock();
        match state.queue.pop_front() {
            Some(next) => Some(next),
            None => {
                state.available = state.available.saturating_add(1);
                None
            }
        }
    }

    /// Removes every queued task without touching slot accounting.
    pub fn drain(&self) -> Vec<T> {
        self.lock().queue.drain(..).collect()
    }

    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn available(&self) -> usize {
        self.lock().available
    }

    fn lock(&self) -> MutexGuard<'_, GateState<T>> {
        // The critical sections never panic halfway, so a poisoned state is
        // still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
