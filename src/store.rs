//! Client window counter storage.
//!
//! A store owns one fixed-window counter per client key. The first hit for a
//! key opens a window; the window closes exactly `window` later and the next
//! hit opens a fresh one.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::error::AdmissionError;

/// Counter state after a single increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Requests observed in the current window, this one included
    pub count: u64,
    /// Time left until the current window closes
    pub reset_after: Duration,
}

/// Concurrency-safe per-key counter with atomic increment-and-read
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request for `key` and return the resulting window state
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowHit, AdmissionError>;

    /// Forget the counter for `key`
    async fn reset(&self, key: &str) -> Result<(), AdmissionError>;

    /// Drop counters whose window has elapsed, returning how many were removed
    async fn sweep(&self, _window: Duration) -> Result<usize, AdmissionError> {
        Ok(0)
    }

    /// Whether the backing storage is reachable
    async fn ping(&self) -> bool;

    /// Short backend name for health reporting
    fn backend(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u64,
    window_start: Instant,
}

/// Process-local store for single-instance deployments
pub struct MemoryStore {
    counters: DashMap<String, WindowCounter>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            clock,
        }
    }

    /// Number of tracked client keys
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowHit, AdmissionError> {
        let now = self.clock.now();

        // The entry guard holds the shard lock, so increment and read are atomic per key.
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert(WindowCounter {
                count: 0,
                window_start: now,
            });
        let counter = entry.value_mut();

        if now.saturating_duration_since(counter.window_start) >= window {
            counter.count = 0;
            counter.window_start = now;
        }

        counter.count += 1;
        let elapsed = now.saturating_duration_since(counter.window_start);

        Ok(WindowHit {
            count: counter.count,
            reset_after: window.saturating_sub(elapsed),
        })
    }

    async fn reset(&self, key: &str) -> Result<(), AdmissionError> {
        self.counters.remove(key);
        Ok(())
    }

    async fn sweep(&self, window: Duration) -> Result<usize, AdmissionError> {
        let now = self.clock.now();
        let initial_count = self.counters.len();

        self.counters
            .retain(|_, counter| now.saturating_duration_since(counter.window_start) < window);

        Ok(initial_count.saturating_sub(self.counters.len()))
    }

    async fn ping(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
