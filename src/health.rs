use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime};

use crate::rate_limiter::RateLimiter;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub stores: Vec<StoreStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreStatus {
    pub policy: String,
    pub backend: String,
    pub status: String,
    pub response_time_ms: u64,
}

static START_TIME: std::sync::LazyLock<SystemTime> = std::sync::LazyLock::new(SystemTime::now);

#[derive(Clone)]
pub struct HealthChecker {
    limiters: Vec<RateLimiter>,
}

impl HealthChecker {
    pub fn new(limiters: Vec<RateLimiter>) -> Self {
        // Pin the uptime origin to service construction rather than the first health check.
        std::sync::LazyLock::force(&START_TIME);
        Self { limiters }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let now = SystemTime::now();
        let uptime = now.duration_since(*START_TIME).unwrap_or_default().as_secs();

        let mut stores = Vec::with_capacity(self.limiters.len());
        for limiter in &self.limiters {
            stores.push(Self::check_store(limiter).await);
        }

        // Counter store outages fail open, so the service is degraded rather than down.
        let overall_status = if stores.iter().all(|store| store.status == "healthy") {
            "healthy"
        } else {
            "degraded"
        };

        HealthStatus {
            status: overall_status.to_string(),
            timestamp: now
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            stores,
        }
    }

    async fn check_store(limiter: &RateLimiter) -> StoreStatus {
        let start = Instant::now();
        let reachable = limiter.store().ping().await;

        StoreStatus {
            policy: limiter.name().to_string(),
            backend: limiter.store().backend().to_string(),
            status: if reachable { "healthy" } else { "unavailable" }.to_string(),
            response_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}
