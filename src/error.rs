use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for AdmissionError {
    fn from(err: redis::RedisError) -> Self {
        AdmissionError::Redis(err.to_string())
    }
}

impl From<envconfig::Error> for AdmissionError {
    fn from(err: envconfig::Error) -> Self {
        AdmissionError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for AdmissionError {
    fn from(err: std::io::Error) -> Self {
        AdmissionError::Internal(err.to_string())
    }
}

pub type AdmissionResult<T> = Result<T, AdmissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdmissionError::Validation("max_requests must be greater than 0".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: max_requests must be greater than 0"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err: AdmissionError = io.into();
        assert!(matches!(err, AdmissionError::Internal(_)));
    }
}
