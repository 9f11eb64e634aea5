use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::AdmissionError;

/// Path that every declared policy lets through without counting.
pub const HEALTH_CHECK_PATH: &str = "/health-check";

/// One hour, the window both declared policies use.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(3_600_000);

/// Admission policy for one protected route group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub max_requests: u64,
    pub standard_headers: bool,
    pub legacy_headers: bool,
    pub exempt_paths: BTreeSet<String>,
}

impl Policy {
    /// Create a new policy that exempts the health check path
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self {
            window,
            max_requests,
            standard_headers: true,
            legacy_headers: false,
            exempt_paths: BTreeSet::from([HEALTH_CHECK_PATH.to_string()]),
        }
    }

    /// Stricter policy guarding the `/api` route group
    pub fn api() -> Self {
        Self::new(DEFAULT_WINDOW, 100)
    }

    /// Looser policy guarding the rest of the application
    pub fn app() -> Self {
        Self::new(DEFAULT_WINDOW, 50)
    }

    pub fn with_standard_headers(mut self, enabled: bool) -> Self {
        self.standard_headers = enabled;
        self
    }

    pub fn with_legacy_headers(mut self, enabled: bool) -> Self {
        self.legacy_headers = enabled;
        self
    }

    /// Replace the exempt path set
    pub fn with_exempt_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exempt_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a request for `original_url` bypasses counting.
    ///
    /// The comparison is exact against the full original URL, so a query
    /// string makes an otherwise exempt path count.
    pub fn skips(&self, original_url: &str) -> bool {
        self.exempt_paths.contains(original_url)
    }

    /// Whether any rate-limit disclosure headers are emitted
    pub fn discloses_headers(&self) -> bool {
        self.standard_headers || self.legacy_headers
    }

    /// Validate policy parameters
    pub fn validate(&self) -> Result<(), AdmissionError> {
        if self.window.is_zero() {
            return Err(AdmissionError::Validation(
                "Window duration must be greater than 0".to_string(),
            ));
        }
        if self.max_requests == 0 {
            return Err(AdmissionError::Validation(
                "Max requests must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
