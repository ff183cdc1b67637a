//! Store connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the shared store connection.
///
/// # Example
///
/// ```ignore
/// use flowgate::StoreConfig;
///
/// let config = StoreConfig::new("redis://localhost:6379")
///     .with_prefix("myapp:rl:")
///     .with_pool_size(20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store connection URL (e.g., "redis://localhost:6379").
    pub url: String,
    /// Connection pool size.
    pub pool_size: usize,
    /// Prefix applied to every bucket key.
    pub key_prefix: String,
    /// Timeout for the initial connection probe.
    pub connect_timeout: Duration,
    /// Bounded number of connection attempts before giving up.
    pub connect_attempts: u32,
    /// Linear backoff step between connection attempts.
    pub backoff_step: Duration,
    /// Upper bound on the backoff delay.
    pub backoff_cap: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: "rl:".to_string(),
            connect_timeout: Duration::from_secs(5),
            connect_attempts: 5,
            backoff_step: Duration::from_millis(200),
            backoff_cap: Duration::from_secs(2),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the bounded connection retry policy: `attempts` tries with a
    /// linear backoff of `step` per attempt, capped at `cap`.
    pub fn with_retry(mut self, attempts: u32, step: Duration, cap: Duration) -> Self {
        self.connect_attempts = attempts;
        self.backoff_step = step;
        self.backoff_cap = cap;
        self
    }

    /// Backoff delay before the given (1-based) attempt.
    pub(crate) fn backoff_delay(&self, attempt: u32) -> Duration {
        (self.backoff_step * attempt).min(self.backoff_cap)
    }
}
