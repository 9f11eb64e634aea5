use crate::config::Config;
use crate::error::AdmissionError;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL
    pub fn validate_redis_url(url: &str) -> Result<(), AdmissionError> {
        if url.is_empty() {
            return Err(AdmissionError::Validation(
                "Redis URL cannot be empty".to_string(),
            ));
        }

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(AdmissionError::Validation(
                "Redis URL must start with 'redis://' or 'rediss://'".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates a `windowMs` / `max` pair
    pub fn validate_limits(name: &str, window_ms: u64, max: u64) -> Result<(), AdmissionError> {
        if window_ms == 0 {
            return Err(AdmissionError::Validation(format!(
                "{} window must be greater than 0",
                name
            )));
        }

        if max == 0 {
            return Err(AdmissionError::Validation(format!(
                "{} max requests must be greater than 0",
                name
            )));
        }

        Ok(())
    }

    /// Validates the full service configuration
    pub fn validate_config(config: &Config) -> Result<(), AdmissionError> {
        Self::validate_limits("API", config.api_window_ms, config.api_max)?;
        Self::validate_limits("App", config.app_window_ms, config.app_max)?;

        if config.uses_redis() {
            Self::validate_redis_url(config.redis_url.trim())?;
        }

        if config.cleanup_interval_secs == 0 {
            return Err(AdmissionError::Validation(
                "Cleanup interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
