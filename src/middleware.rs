use axum::extract::{ConnectInfo, OriginalUri, Request, State};
use axum::http::{Method, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tracing::{info, warn};

use crate::key_generator::KeyGenerator;
use crate::rate_limiter::{Decision, RateLimiter};
use crate::response::{apply_rate_limit_headers, Rejection};

/// Path prefix of the route group guarded by the API policy
pub const API_PREFIX: &str = "/api";

/// Whether `path` belongs to the `/api` route group, trailing slash included
pub fn is_api_path(path: &str) -> bool {
    path.strip_prefix(API_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Limiter and identity resolution for one route group
#[derive(Clone)]
pub struct AdmissionFilter {
    pub limiter: RateLimiter,
    pub keys: KeyGenerator,
}

impl AdmissionFilter {
    pub fn new(limiter: RateLimiter, keys: KeyGenerator) -> Self {
        Self { limiter, keys }
    }
}

/// State handed to [`admission_middleware`]: one filter per route group
#[derive(Clone)]
pub struct RouteGroups {
    pub api: AdmissionFilter,
    pub app: AdmissionFilter,
}

impl RouteGroups {
    /// Filter guarding the request path
    pub fn select(&self, path: &str) -> &AdmissionFilter {
        if is_api_path(path) {
            &self.api
        } else {
            &self.app
        }
    }
}

/// Admit or throttle a request against its route group's policy
pub async fn admission_middleware(
    State(groups): State<RouteGroups>,
    request: Request,
    next: Next,
) -> Response {
    let original_url = original_url(&request);
    let path = original_url
        .split_once('?')
        .map_or(original_url.as_str(), |(path, _)| path);
    let filter = groups.select(path);
    let client = filter
        .keys
        .client_identity(request.headers(), peer_addr(&request));

    match filter.limiter.check(&original_url, &client).await {
        Decision::Unmetered => next.run(request).await,
        Decision::Allow(quota) => {
            let mut response = next.run(request).await;
            apply_rate_limit_headers(response.headers_mut(), filter.limiter.policy(), &quota, false);
            response
        }
        Decision::Reject(quota) => {
            warn!(
                target: "admission_filter::middleware",
                policy = %filter.limiter.name(),
                client = %client,
                url = %original_url,
                used = quota.used,
                "Rate limit exceeded"
            );
            let mut response = Rejection::negotiate(request.headers(), &original_url).into_response();
            apply_rate_limit_headers(response.headers_mut(), filter.limiter.policy(), &quota, true);
            response
        }
    }
}

/// Fields logged for every request
#[derive(Debug)]
struct RequestLog {
    method: Method,
    uri: Uri,
    client_ip: String,
}

impl RequestLog {
    fn from_request(keys: &KeyGenerator, request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            client_ip: keys.client_identity(request.headers(), peer_addr(request)),
        }
    }
}

/// Logging middleware for request/response tracking.
///
/// The client is resolved with the same key generator the limiter uses.
pub async fn logging_middleware(
    State(keys): State<KeyGenerator>,
    request: Request,
    next: Next,
) -> Response {
    let log = RequestLog::from_request(&keys, &request);

    info!(
        target: "admission_filter::middleware",
        method = %log.method,
        uri = %log.uri,
        client_ip = %log.client_ip,
        "Incoming request"
    );

    let response = next.run(request).await;

    info!(
        target: "admission_filter::middleware",
        method = %log.method,
        uri = %log.uri,
        status = %response.status(),
        "Request completed"
    );

    response
}

/// Full request URL as the client sent it, before any router nesting stripped a prefix
fn original_url(request: &Request) -> String {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or_else(|| request.uri());

    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}
