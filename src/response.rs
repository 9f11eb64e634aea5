use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::rate_limit_config::Policy;
use crate::rate_limiter::Quota;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later?";

const RATE_LIMIT_PAGE: &str = include_str!("../static/rate-limit.html");

const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// JSON body returned to API clients that were throttled
#[derive(Debug, Serialize)]
pub struct RejectionBody {
    pub status: &'static str,
    pub request_url: String,
    pub message: &'static str,
    pub data: Vec<serde_json::Value>,
}

impl RejectionBody {
    pub fn new(request_url: impl Into<String>) -> Self {
        Self {
            status: "fail",
            request_url: request_url.into(),
            message: RATE_LIMIT_MESSAGE,
            data: Vec::new(),
        }
    }
}

/// Response producer for a throttled request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Json { request_url: String },
    Html,
}

impl Rejection {
    /// Pick the rejection format from the request's declared content type.
    ///
    /// Only an exact `application/json` selects JSON; anything else, including
    /// a missing or non-UTF-8 header, gets the HTML page.
    pub fn negotiate(headers: &HeaderMap, original_url: &str) -> Self {
        let declares_json = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == "application/json");

        if declares_json {
            Rejection::Json {
                request_url: original_url.to_string(),
            }
        } else {
            Rejection::Html
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Rejection::Json { request_url } => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(RejectionBody::new(request_url)),
            )
                .into_response(),
            Rejection::Html => (StatusCode::TOO_MANY_REQUESTS, Html(RATE_LIMIT_PAGE)).into_response(),
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Write the policy's disclosure headers for a metered decision
pub fn apply_rate_limit_headers(
    headers: &mut HeaderMap,
    policy: &Policy,
    quota: &Quota,
    rejected: bool,
) {
    let reset_secs = ceil_secs(quota.reset_after);

    if policy.standard_headers {
        let policy_value = format!("{};w={}", quota.limit, ceil_secs(quota.window));
        if let Ok(value) = HeaderValue::from_str(&policy_value) {
            headers.insert(RATELIMIT_POLICY, value);
        }
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(reset_secs));
    }

    if policy.legacy_headers {
        let reset_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            + reset_secs;
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_at));
    }

    if rejected && policy.discloses_headers() {
        headers.insert(RETRY_AFTER, HeaderValue::from(reset_secs));
    }
}
