use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot of admission counters for one policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionMetrics {
    pub total_requests: u64,
    pub allowed_requests: u64,
    pub rejected_requests: u64,
    pub unmetered_requests: u64,
    pub since: u64,
}

#[derive(Debug)]
struct Counters {
    allowed: AtomicU64,
    rejected: AtomicU64,
    unmetered: AtomicU64,
    since: u64,
}

#[derive(Debug, Clone)]
pub struct MetricsCollector {
    counters: Arc<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters {
                allowed: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                unmetered: AtomicU64::new(0),
                since: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs(),
            }),
        }
    }

    pub fn record_allowed(&self) {
        self.counters.allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unmetered(&self) {
        self.counters.unmetered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AdmissionMetrics {
        let allowed = self.counters.allowed.load(Ordering::Relaxed);
        let rejected = self.counters.rejected.load(Ordering::Relaxed);
        let unmetered = self.counters.unmetered.load(Ordering::Relaxed);

        AdmissionMetrics {
            total_requests: allowed + rejected + unmetered,
            allowed_requests: allowed,
            rejected_requests: rejected,
            unmetered_requests: unmetered,
            since: self.counters.since,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
