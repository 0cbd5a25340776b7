//! Error types shared across lmsync crates

use thiserror::Error;

/// Result type alias for lmsync operations
pub type Result<T> = std::result::Result<T, LmsyncError>;

/// Main error type for lmsync
#[derive(Error, Debug)]
pub enum LmsyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LmsyncError::Config("missing UPSTREAM_BASE_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing UPSTREAM_BASE_URL"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: LmsyncError = io.into();
        assert!(matches!(err, LmsyncError::Io(_)));
    }
}
