//! Decision façade and quota inspector.
//!
//! [`RateLimiter`] is the single entry point: it dispatches a decision to the
//! selected algorithm, captures the clock reading exactly once per call, and
//! returns the uniform verdict envelope. All mutable bucket state lives in
//! the shared store; the limiter itself is stateless per call and safe under
//! unbounded concurrent callers.
//!
//! # Example
//!
//! ```ignore
//! use flowgate::{RateLimiter, StoreConfig, Strategy};
//!
//! let limiter = RateLimiter::builder()
//!     .config(StoreConfig::new("redis://localhost:6379"))
//!     .connect()
//!     .await?;
//!
//! let verdict = limiter
//!     .check_rate_limit("tenant:42:search", 100, 60, Strategy::TokenBucket)
//!     .await?;
//!
//! if verdict.is_denied() {
//!     println!("rate limited until {}", verdict.reset_at);
//! }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use deadpool_redis::redis::{ErrorKind, cmd};
use deadpool_redis::{Config as PoolBuilder, Connection, Pool, PoolConfig, Runtime};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::algorithm::{self, FixedWindowOptions, Strategy};
use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{ConfigError, ConnectionError, RateLimitError, Result};
use crate::events::{EventBus, QuotaViolation};
use crate::script::{into_store_error, ScriptRegistry, ScriptRunner};
use crate::verdict::{FixedWindowStatus, QuotaStatus, Verdict};

/// Distributed rate limiter over a shared store.
pub struct RateLimiter {
    pool: Pool,
    runner: Arc<ScriptRunner>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
    shutdown: watch::Sender<bool>,
    events: Option<EventBus>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("url", &self.config.url)
            .field("key_prefix", &self.config.key_prefix)
            .finish()
    }
}

impl RateLimiter {
    /// Create a new rate limiter builder.
    pub fn builder() -> RateLimiterBuilder {
        RateLimiterBuilder::new()
    }

    /// Connect with the given configuration, probe the store, and preload
    /// the script digests.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        Self::builder().config(config).connect().await
    }

    /// Check a request against the bucket at `key` using `strategy`.
    ///
    /// `limit` is the admissions per window (token and sliding window) or
    /// the bucket capacity (leaky). The clock is read once and passed to the
    /// store script, so every number in the verdict references the same
    /// instant.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_secs: u64,
        strategy: Strategy,
    ) -> Result<Verdict> {
        if limit == 0 {
            return Err(ConfigError::InvalidQuota("limit must be greater than 0".into()).into());
        }
        if window_secs == 0 {
            return Err(ConfigError::InvalidQuota("window must be greater than 0".into()).into());
        }

        let now = self.clock.now_ms();
        let full_key = self.full_key(key);

        let verdict = self
            .guard(async {
                match strategy {
                    Strategy::TokenBucket => {
                        algorithm::token_bucket::check(&self.runner, &full_key, limit, window_secs, now)
                            .await
                    }
                    Strategy::SlidingWindow => {
                        algorithm::sliding_window::check(&self.runner, &full_key, limit, window_secs, now)
                            .await
                    }
                    Strategy::LeakyBucket => {
                        algorithm::leaky_bucket::check(&self.runner, &full_key, limit, window_secs, now)
                            .await
                    }
                }
            })
            .await?;

        debug!(
            key,
            strategy = %strategy,
            allowed = verdict.allowed,
            remaining = verdict.remaining,
            "rate limit decision"
        );

        if verdict.is_denied() {
            self.emit_violation(key, strategy, limit, &verdict, now).await;
        }

        Ok(verdict)
    }

    /// Increment the fixed-window counter at `key`.
    ///
    /// The counter always increments; whether `current > max` blocks the
    /// request is the caller's policy. See [`FixedWindowOptions`] for the
    /// punishment modes applied while over the limit.
    pub async fn fixed_window_rate_limit(
        &self,
        key: &str,
        options: FixedWindowOptions,
    ) -> Result<FixedWindowStatus> {
        if options.time_window_ms == 0 {
            return Err(ConfigError::InvalidQuota("window must be greater than 0".into()).into());
        }
        if options.max == 0 {
            return Err(ConfigError::InvalidQuota("max must be greater than 0".into()).into());
        }

        let full_key = self.full_key(key);
        let status = self
            .guard(algorithm::fixed_window::check(&self.runner, &full_key, &options))
            .await?;

        debug!(key, current = status.current, window_ms = status.time_window_ms, "fixed window decision");

        Ok(status)
    }

    /// Best-effort snapshot of the bucket at `key`.
    ///
    /// This is a diagnostic, not a decision path: store errors are swallowed
    /// and reported as a zero snapshot.
    pub async fn get_quota_status(&self, key: &str, strategy: Strategy) -> QuotaStatus {
        match self.read_quota(key, strategy).await {
            Ok(status) => status,
            Err(err) => {
                debug!(key, error = %err, "quota status read failed");
                QuotaStatus::empty()
            }
        }
    }

    /// Unconditionally delete the bucket at `key`.
    pub async fn delete_rate_limit(&self, key: &str) -> Result<()> {
        let full_key = self.full_key(key);
        self.guard(async {
            let mut conn = self.connection().await?;
            let _: () = cmd("DEL")
                .arg(&full_key)
                .query_async(&mut *conn)
                .await
                .map_err(|err| RateLimitError::from(into_store_error(err)))?;
            Ok(())
        })
        .await
    }

    /// Collect every bucket key matching `pattern`.
    ///
    /// Iterates the store's cursor scan until the cursor wraps to zero. The
    /// configured key prefix is applied to the pattern and stripped from the
    /// results, so the returned keys are caller keys.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let full_pattern = self.full_key(pattern);
        self.guard(async {
            let mut conn = self.connection().await?;
            let mut keys = Vec::new();
            let mut cursor: u64 = 0;

            loop {
                let (next, batch): (u64, Vec<String>) = cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&full_pattern)
                    .arg("COUNT")
                    .arg(100)
                    .query_async(&mut *conn)
                    .await
                    .map_err(|err| RateLimitError::from(into_store_error(err)))?;

                keys.extend(batch.iter().map(|key| self.strip_prefix(key)));
                cursor = next;
                if cursor == 0 {
                    break;
                }
            }

            Ok(keys)
        })
        .await
    }

    /// Register all scripts with the store and refresh the digest table.
    ///
    /// Runs automatically after [`connect`](Self::connect); call it again
    /// when the host observes a store "ready" transition. Failures are
    /// logged and non-fatal.
    pub async fn preload_scripts(&self) {
        self.runner.preload().await;
    }

    /// The script runner backing this limiter.
    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    /// Cancel in-flight and future calls.
    ///
    /// Pending calls resolve to [`RateLimitError::Cancelled`] without
    /// retrying: the script has either executed or not, and a retry could
    /// double-deduct.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    async fn read_quota(&self, key: &str, strategy: Strategy) -> Result<QuotaStatus> {
        let full_key = self.full_key(key);
        let mut conn = self.connection().await?;

        match strategy {
            Strategy::SlidingWindow => {
                let count: u64 = cmd("ZCARD")
                    .arg(&full_key)
                    .query_async(&mut *conn)
                    .await
                    .map_err(into_store_error)?;
                Ok(QuotaStatus {
                    remaining: count,
                    total: count,
                })
            }
            _ => {
                let fields: Vec<Option<String>> = cmd("HMGET")
                    .arg(&full_key)
                    .arg("tokens")
                    .query_async(&mut *conn)
                    .await
                    .map_err(into_store_error)?;

                let tokens = fields
                    .into_iter()
                    .flatten()
                    .next()
                    .and_then(|raw| raw.parse::<f64>().ok())
                    .map(|tokens| tokens.max(0.0).floor() as u64)
                    .unwrap_or(0);

                Ok(QuotaStatus {
                    remaining: tokens,
                    total: tokens,
                })
            }
        }
    }

    async fn emit_violation(
        &self,
        key: &str,
        strategy: Strategy,
        limit: u64,
        verdict: &Verdict,
        now_ms: u64,
    ) {
        let Some(bus) = &self.events else {
            return;
        };

        let violation = QuotaViolation {
            key: key.to_string(),
            strategy,
            limit,
            reset_at: verdict.reset_at,
            occurred_at: now_ms,
        };

        if let Err(err) = bus.publish(&violation).await {
            warn!(key, error = %err, "failed to publish quota violation");
        }
    }

    /// Race a store operation against the shutdown flag.
    async fn guard<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let mut rx = self.shutdown.subscribe();
        if *rx.borrow() {
            return Err(RateLimitError::Cancelled);
        }

        tokio::select! {
            result = operation => result,
            _ = rx.changed() => Err(RateLimitError::Cancelled),
        }
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|_| crate::error::StoreError::PoolExhausted.into())
    }

    async fn probe(&self) -> Result<()> {
        let attempts = self.config.connect_attempts.max(1);
        let mut last_err: Option<RateLimitError> = None;

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.connect_timeout, self.ping()).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => last_err = Some(err),
                Err(_) => {
                    last_err = Some(ConnectionError::Timeout(self.config.connect_timeout).into())
                }
            }

            if attempt < attempts {
                let delay = self.config.backoff_delay(attempt);
                debug!(attempt, ?delay, "store probe failed, backing off");
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_err
            .unwrap_or_else(|| ConnectionError::ConnectionFailed("store unreachable".into()).into()))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::AuthenticationFailed {
                    ConnectionError::AuthFailed(err.to_string())
                } else {
                    ConnectionError::ConnectionFailed(err.to_string())
                }
            })?;
        Ok(())
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn strip_prefix(&self, key: &str) -> String {
        key.strip_prefix(&self.config.key_prefix)
            .unwrap_or(key)
            .to_string()
    }
}

/// Builder for [`RateLimiter`].
pub struct RateLimiterBuilder {
    config: StoreConfig,
    script_dir: Option<PathBuf>,
    clock: Option<Arc<dyn Clock>>,
    violation_channel: Option<String>,
}

impl Default for RateLimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
            script_dir: None,
            clock: None,
            violation_channel: None,
        }
    }

    /// Set the store configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Load script sources from `dir` instead of the bundled copies.
    ///
    /// A missing script file makes [`build`](Self::build) fail.
    pub fn script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    /// Override the decision clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Broadcast denied decisions on the given pub/sub channel.
    pub fn violation_channel(mut self, channel: impl Into<String>) -> Self {
        self.violation_channel = Some(channel.into());
        self
    }

    /// Build the limiter without touching the network.
    ///
    /// The pool connects lazily; use [`connect`](Self::connect) to probe the
    /// store and preload scripts eagerly.
    pub fn build(self) -> Result<RateLimiter> {
        let registry = match &self.script_dir {
            Some(dir) => ScriptRegistry::load(dir)?,
            None => ScriptRegistry::bundled(),
        };

        let mut pool_builder = PoolBuilder::from_url(&self.config.url);
        pool_builder.pool = Some(PoolConfig::new(self.config.pool_size));
        let pool = pool_builder
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|err| ConnectionError::ConnectionFailed(err.to_string()))?;

        let runner = Arc::new(ScriptRunner::new(pool.clone(), registry));
        let events = self
            .violation_channel
            .map(|channel| EventBus::new(pool.clone(), channel));
        let (shutdown, _) = watch::channel(false);

        Ok(RateLimiter {
            pool,
            runner,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: self.config,
            shutdown,
            events,
        })
    }

    /// Build, probe the store with bounded linear-backoff retries, and
    /// preload the script digests.
    pub async fn connect(self) -> Result<RateLimiter> {
        let limiter = self.build()?;
        limiter.probe().await?;
        limiter.preload_scripts().await;
        Ok(limiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_limiter() -> RateLimiter {
        RateLimiter::builder()
            .config(StoreConfig::new("redis://127.0.0.1:6379").with_prefix("t:"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_zero_limit_is_config_error() {
        let limiter = offline_limiter();
        let err = limiter
            .check_rate_limit("k", 0, 10, Strategy::TokenBucket)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RateLimitError::Config(ConfigError::InvalidQuota(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_window_is_config_error() {
        let limiter = offline_limiter();
        let err = limiter
            .check_rate_limit("k", 10, 0, Strategy::SlidingWindow)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RateLimitError::Config(ConfigError::InvalidQuota(_))
        ));
    }

    #[tokio::test]
    async fn test_fixed_window_validates_options() {
        let limiter = offline_limiter();

        let err = limiter
            .fixed_window_rate_limit("k", FixedWindowOptions::new(0, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, RateLimitError::Config(_)));

        let err = limiter
            .fixed_window_rate_limit("k", FixedWindowOptions::new(1_000, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RateLimitError::Config(_)));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_before_dispatch() {
        let limiter = offline_limiter();
        limiter.shutdown();

        let err = limiter
            .check_rate_limit("k", 10, 10, Strategy::TokenBucket)
            .await
            .unwrap_err();
        assert!(matches!(err, RateLimitError::Cancelled));

        let err = limiter.delete_rate_limit("k").await.unwrap_err();
        assert!(matches!(err, RateLimitError::Cancelled));
    }

    #[tokio::test]
    async fn test_key_prefixing() {
        let limiter = offline_limiter();

        assert_eq!(limiter.full_key("tenant:1"), "t:tenant:1");
        assert_eq!(limiter.strip_prefix("t:tenant:1"), "tenant:1");
        // Keys from another prefix generation pass through untouched.
        assert_eq!(limiter.strip_prefix("other:key"), "other:key");
    }
}
