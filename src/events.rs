//! Quota-violation broadcast surface.
//!
//! The engine does not fan events out itself; it hands them to the store's
//! pub/sub channel, where the host application's broadcast bus picks them up.

use deadpool_redis::redis::cmd;
use deadpool_redis::Pool;
use serde::{Deserialize, Serialize};

use crate::algorithm::Strategy;
use crate::error::{Result, StoreError};

/// A denied decision, as broadcast to the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaViolation {
    /// Caller-supplied bucket key (without the store prefix).
    pub key: String,
    /// Strategy that denied the request.
    pub strategy: Strategy,
    /// Configured limit for the bucket.
    pub limit: u64,
    /// Projected epoch millisecond at which quota is available again.
    pub reset_at: u64,
    /// Epoch millisecond of the denied decision.
    pub occurred_at: u64,
}

/// Publishes events on a store pub/sub channel.
pub struct EventBus {
    pool: Pool,
    channel: String,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("channel", &self.channel)
            .finish()
    }
}

impl EventBus {
    /// Create a bus publishing on `channel`.
    pub fn new(pool: Pool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }

    /// The configured channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish a quota violation on the configured channel.
    pub async fn publish(&self, violation: &QuotaViolation) -> Result<()> {
        let message = serde_json::to_string(violation)
            .map_err(|err| StoreError::operation_failed(err.to_string(), false))?;
        self.publish_raw(&self.channel, &message).await
    }

    /// Publish an arbitrary message on an arbitrary channel.
    pub async fn publish_raw(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| StoreError::PoolExhausted)?;

        let _: i64 = cmd("PUBLISH")
            .arg(channel)
            .arg(message)
            .query_async(&mut *conn)
            .await
            .map_err(|err| StoreError::operation_failed(err.to_string(), true))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_payload_shape() {
        let violation = QuotaViolation {
            key: "tenant:42:search".into(),
            strategy: Strategy::TokenBucket,
            limit: 10,
            reset_at: 61_000,
            occurred_at: 1_000,
        };

        let json = serde_json::to_string(&violation).unwrap();
        assert!(json.contains(r#""strategy":"token_bucket""#));
        assert!(json.contains(r#""key":"tenant:42:search""#));

        let parsed: QuotaViolation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, violation);
    }
}
