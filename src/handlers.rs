use axum::{
    extract::{OriginalUri, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::AdmissionResult;
use crate::health::{HealthChecker, HealthStatus};
use crate::key_generator::KeyGenerator;
use crate::metrics::AdmissionMetrics;
use crate::middleware::{is_api_path, AdmissionFilter, RouteGroups};
use crate::rate_limiter::RateLimiter;
use crate::redis_store::RedisStore;
use crate::store::{CounterStore, MemoryStore};

/// Application state shared by the route groups
#[derive(Clone)]
pub struct AppState {
    pub api: RateLimiter,
    pub app: RateLimiter,
    pub keys: KeyGenerator,
    pub health: HealthChecker,
}

impl AppState {
    /// Build the state with the counter store selected by `config`.
    ///
    /// Redis is shared by both policies; in-process counting gets one store per
    /// policy so that sweeping with one window never drops the other's counters.
    pub async fn from_config(config: &Config) -> AdmissionResult<Self> {
        if config.uses_redis() {
            let redis: Arc<dyn CounterStore> =
                Arc::new(RedisStore::connect(config.redis_url.trim()).await?);
            return Self::with_stores(config, redis.clone(), redis);
        }

        Self::with_stores(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    pub fn with_stores(
        config: &Config,
        api_store: Arc<dyn CounterStore>,
        app_store: Arc<dyn CounterStore>,
    ) -> AdmissionResult<Self> {
        let api = RateLimiter::new("api", config.api_policy(), api_store)?;
        let app = RateLimiter::new("app", config.app_policy(), app_store)?;
        let health = HealthChecker::new(vec![api.clone(), app.clone()]);

        Ok(Self {
            api,
            app,
            keys: KeyGenerator::trusting_proxy(config.trust_proxy_headers),
            health,
        })
    }

    pub fn route_groups(&self) -> RouteGroups {
        RouteGroups {
            api: AdmissionFilter::new(self.api.clone(), self.keys.clone()),
            app: AdmissionFilter::new(self.app.clone(), self.keys.clone()),
        }
    }

    pub fn limiters(&self) -> Vec<RateLimiter> {
        vec![self.api.clone(), self.app.clone()]
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub request_url: String,
    pub message: String,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub api: AdmissionMetrics,
    pub app: AdmissionMetrics,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check endpoint, exempt from every policy
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.health.check_health().await)
}

/// Per-policy admission counters
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        api: state.api.metrics().snapshot(),
        app: state.app.metrics().snapshot(),
    })
}

/// API status endpoint
pub async fn api_status(OriginalUri(uri): OriginalUri) -> Json<ApiResponse<ServiceInfo>> {
    Json(ApiResponse {
        status: "success",
        request_url: uri.to_string(),
        message: "Service is running".to_string(),
        data: ServiceInfo {
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
    })
}

fn api_not_found(uri: &Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse {
            status: "fail",
            request_url: uri.to_string(),
            message: "Resource not found".to_string(),
            data: Vec::<serde_json::Value>::new(),
        }),
    )
        .into_response()
}

pub async fn index() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>Admission Filter</title></head>\
         <body><h1>Admission Filter</h1><p>The service is up.</p></body></html>",
    )
}

/// Fallback for every unknown route; `/api` paths get the JSON variant
pub async fn not_found(OriginalUri(uri): OriginalUri) -> Response {
    if is_api_path(uri.path()) {
        return api_not_found(&uri);
    }
    (StatusCode::NOT_FOUND, Html("<h1>Not Found</h1>")).into_response()
}
