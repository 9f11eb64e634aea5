use envconfig::Envconfig;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::AdmissionResult;
use crate::rate_limit_config::Policy;

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Server bind address
    #[envconfig(from = "BIND_ADDR", default = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// Redis connection URL, empty for the in-process counter store
    #[envconfig(from = "REDIS_URL", default = "")]
    pub redis_url: String,

    /// Window length of the `/api` policy in milliseconds
    #[envconfig(from = "API_WINDOW_MS", default = "3600000")]
    pub api_window_ms: u64,

    /// Requests allowed per window on the `/api` policy
    #[envconfig(from = "API_MAX", default = "100")]
    pub api_max: u64,

    /// Window length of the application policy in milliseconds
    #[envconfig(from = "APP_WINDOW_MS", default = "3600000")]
    pub app_window_ms: u64,

    /// Requests allowed per window on the application policy
    #[envconfig(from = "APP_MAX", default = "50")]
    pub app_max: u64,

    /// Emit `RateLimit-*` headers
    #[envconfig(from = "STANDARD_HEADERS", default = "true")]
    pub standard_headers: bool,

    /// Emit `X-RateLimit-*` headers
    #[envconfig(from = "LEGACY_HEADERS", default = "false")]
    pub legacy_headers: bool,

    /// Comma-separated URLs that are never counted
    #[envconfig(from = "EXEMPT_PATHS", default = "/health-check")]
    pub exempt_paths: String,

    /// Identify clients by `X-Forwarded-For` instead of the peer address
    #[envconfig(from = "TRUST_PROXY_HEADERS", default = "false")]
    pub trust_proxy_headers: bool,

    /// Idle counter sweep interval in seconds
    #[envconfig(from = "CLEANUP_INTERVAL", default = "300")]
    pub cleanup_interval_secs: u64,

    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AdmissionResult<Self> {
        Ok(Config::init_from_env()?)
    }

    pub fn uses_redis(&self) -> bool {
        !self.redis_url.trim().is_empty()
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn api_policy(&self) -> Policy {
        self.policy(self.api_window_ms, self.api_max)
    }

    pub fn app_policy(&self) -> Policy {
        self.policy(self.app_window_ms, self.app_max)
    }

    fn policy(&self, window_ms: u64, max_requests: u64) -> Policy {
        Policy::new(Duration::from_millis(window_ms), max_requests)
            .with_standard_headers(self.standard_headers)
            .with_legacy_headers(self.legacy_headers)
            .with_exempt_paths(
                self.exempt_paths
                    .split(',')
                    .map(str::trim)
                    .filter(|path| !path.is_empty()),
            )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            redis_url: String::new(),
            api_window_ms: 3_600_000,
            api_max: 100,
            app_window_ms: 3_600_000,
            app_max: 50,
            standard_headers: true,
            legacy_headers: false,
            exempt_paths: "/health-check".to_string(),
            trust_proxy_headers: false,
            cleanup_interval_secs: 300,
            log_level: "info".to_string(),
        }
    }
}
