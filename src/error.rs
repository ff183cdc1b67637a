//! Error types for rate limiting operations.
//!
//! The engine never substitutes a verdict on failure: a store error reaches
//! the caller, who decides whether to fail open or fail closed.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for rate limiting operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Main error type for rate limiting operations.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Configuration error (programmer bug, fatal to the call).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Shared store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Connection error (store unreachable, handshake failed).
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The caller's context was cancelled before the store replied.
    ///
    /// The script has either executed or not; the bucket's true state is
    /// whatever the store committed. Callers must not retry.
    #[error("Operation cancelled before the store reply arrived")]
    Cancelled,
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Strategy name did not match any known limiter algorithm.
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Non-positive limit or window.
    #[error("Invalid quota: {0}")]
    InvalidQuota(String),

    /// A script source file was absent at startup.
    #[error("Missing script '{name}' at {path}")]
    MissingScript {
        /// Logical script name.
        name: &'static str,
        /// Path that was probed.
        path: PathBuf,
    },
}

/// Store-related errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store command failed.
    #[error("{message}")]
    OperationFailed {
        /// Error message from the store client.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Connection pool exhausted.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A script reply did not match the expected tuple shape.
    #[error("Unexpected script reply: {0}")]
    BadReply(String),
}

impl StoreError {
    /// Create a new operation failed error.
    pub fn operation_failed(message: impl Into<String>, retryable: bool) -> Self {
        Self::OperationFailed {
            message: message.into(),
            retryable,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::OperationFailed { retryable, .. } => *retryable,
            Self::PoolExhausted => true,
            Self::BadReply(_) => false,
        }
    }
}

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Failed to connect.
    #[error("Failed to connect: {0}")]
    ConnectionFailed(String),

    /// Connection timeout.
    #[error("Connection timeout after {0:?}")]
    Timeout(Duration),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_retryable() {
        let err = StoreError::operation_failed("test", true);
        assert!(err.is_retryable());

        let err = StoreError::operation_failed("test", false);
        assert!(!err.is_retryable());

        let err = StoreError::PoolExhausted;
        assert!(err.is_retryable());

        let err = StoreError::BadReply("not a tuple".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = RateLimitError::Config(ConfigError::UnknownStrategy("leaky_window".into()));
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown strategy: leaky_window"
        );

        let err = ConfigError::MissingScript {
            name: "token-bucket",
            path: PathBuf::from("/etc/scripts"),
        };
        assert!(err.to_string().contains("token-bucket"));

        let err = RateLimitError::Cancelled;
        assert!(err.to_string().contains("cancelled"));
    }
}
