use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AdmissionError;
use crate::metrics::MetricsCollector;
use crate::rate_limit_config::Policy;
use crate::store::CounterStore;

/// Quota state disclosed alongside a metered decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u64,
    pub used: u64,
    pub remaining: u64,
    pub reset_after: Duration,
    pub window: Duration,
}

/// Outcome of admitting a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let through without touching the counter
    Unmetered,
    /// Counted and within quota
    Allow(Quota),
    /// Counted and over quota
    Reject(Quota),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Reject(_))
    }

    pub fn quota(&self) -> Option<&Quota> {
        match self {
            Decision::Unmetered => None,
            Decision::Allow(quota) | Decision::Reject(quota) => Some(quota),
        }
    }
}

/// Fixed-window admission filter for one protected route group
#[derive(Clone)]
pub struct RateLimiter {
    name: Arc<str>,
    policy: Arc<Policy>,
    store: Arc<dyn CounterStore>,
    metrics: MetricsCollector,
}

impl RateLimiter {
    pub fn new(
        name: impl Into<Arc<str>>,
        policy: Policy,
        store: Arc<dyn CounterStore>,
    ) -> Result<Self, AdmissionError> {
        policy.validate()?;

        Ok(Self {
            name: name.into(),
            policy: Arc::new(policy),
            store,
            metrics: MetricsCollector::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Classify a request for `original_url` from `client`.
    ///
    /// A store failure lets the request through unmetered.
    pub async fn check(&self, original_url: &str, client: &str) -> Decision {
        if self.policy.skips(original_url) {
            self.metrics.record_unmetered();
            return Decision::Unmetered;
        }

        let hit = match self.store.increment(&self.key_for(client), self.policy.window).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(
                    policy = %self.name,
                    client = %client,
                    error = %err,
                    "Counter store unavailable, admitting request unmetered"
                );
                self.metrics.record_unmetered();
                return Decision::Unmetered;
            }
        };

        let quota = Quota {
            limit: self.policy.max_requests,
            used: hit.count,
            remaining: self.policy.max_requests.saturating_sub(hit.count),
            reset_after: hit.reset_after,
            window: self.policy.window,
        };

        if hit.count > self.policy.max_requests {
            self.metrics.record_rejected();
            Decision::Reject(quota)
        } else {
            debug!(policy = %self.name, client = %client, used = hit.count, "Request admitted");
            self.metrics.record_allowed();
            Decision::Allow(quota)
        }
    }

    /// Clear the counter for `client`
    pub async fn reset(&self, client: &str) -> Result<(), AdmissionError> {
        self.store.reset(&self.key_for(client)).await
    }

    /// Drop counters idle beyond the policy window
    pub async fn sweep(&self) -> Result<usize, AdmissionError> {
        self.store.sweep(self.policy.window).await
    }

    fn key_for(&self, client: &str) -> String {
        format!("{}:{}", self.name, client)
    }
}
