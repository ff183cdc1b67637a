//! Result envelopes for rate limit decisions.
//!
//! Every strategy dispatched through [`check_rate_limit`] returns the same
//! [`Verdict`] shape. The fixed-window entry point has its own
//! [`FixedWindowStatus`] because its reply differs: it reports the raw
//! counter and the (possibly extended) window, and leaves the allow/deny
//! judgement to the caller.
//!
//! [`check_rate_limit`]: crate::RateLimiter::check_rate_limit

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The outcome of a rate limit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Remaining quota, floored so integer consumers see a conservative count.
    pub remaining: u64,
    /// Projected epoch millisecond at which quota is fully available again.
    pub reset_at: u64,
}

impl Verdict {
    /// Check if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Check if the request is denied.
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// How long until the quota resets, measured from `now_ms`.
    ///
    /// Returns zero when the reset instant has already passed.
    pub fn retry_after(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.reset_at.saturating_sub(now_ms))
    }

    /// Convert to HTTP headers.
    ///
    /// Returns a vector of (header_name, header_value) pairs. `Retry-After`
    /// is included only on a denied verdict.
    pub fn to_headers(&self, limit: u64, now_ms: u64) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", (self.reset_at / 1000).to_string()),
        ];

        if self.is_denied() {
            headers.push(("Retry-After", self.retry_after(now_ms).as_secs().to_string()));
        }

        headers
    }
}

/// The outcome of a fixed-window decision.
///
/// The script always increments; whether `current > max` blocks the request
/// is the caller's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWindowStatus {
    /// Counter value after this call's increment. Starts at 1.
    pub current: u64,
    /// The window in milliseconds: the base window when it was (re)armed by
    /// this call, otherwise the residual TTL on the counter.
    pub time_window_ms: u64,
}

impl FixedWindowStatus {
    /// Whether this call pushed the counter over the given maximum.
    pub fn is_over(&self, max: u64) -> bool {
        self.current > max
    }
}

/// Best-effort snapshot of a bucket's quota, from the diagnostic path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    /// Remaining admissions.
    pub remaining: u64,
    /// Total recorded for the bucket.
    pub total: u64,
}

impl QuotaStatus {
    /// The zero snapshot returned when the store cannot be read.
    pub fn empty() -> Self {
        Self {
            remaining: 0,
            total: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_allowed() {
        let verdict = Verdict {
            allowed: true,
            remaining: 9,
            reset_at: 61_000,
        };

        assert!(verdict.is_allowed());
        assert!(!verdict.is_denied());
        assert_eq!(verdict.retry_after(1_000), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_saturates() {
        let verdict = Verdict {
            allowed: false,
            remaining: 0,
            reset_at: 1_000,
        };

        assert_eq!(verdict.retry_after(5_000), Duration::ZERO);
    }

    #[test]
    fn test_verdict_headers() {
        let verdict = Verdict {
            allowed: false,
            remaining: 0,
            reset_at: 70_000,
        };

        let headers = verdict.to_headers(100, 10_000);

        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Limit" && v == "100"));
        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Remaining" && v == "0"));
        assert!(headers.iter().any(|(k, v)| *k == "X-RateLimit-Reset" && v == "70"));
        assert!(headers.iter().any(|(k, v)| *k == "Retry-After" && v == "60"));
    }

    #[test]
    fn test_allowed_verdict_has_no_retry_after_header() {
        let verdict = Verdict {
            allowed: true,
            remaining: 3,
            reset_at: 70_000,
        };

        let headers = verdict.to_headers(10, 10_000);
        assert!(!headers.iter().any(|(k, _)| *k == "Retry-After"));
    }

    #[test]
    fn test_fixed_window_over() {
        let status = FixedWindowStatus {
            current: 3,
            time_window_ms: 60_000,
        };

        assert!(status.is_over(2));
        assert!(!status.is_over(3));
    }

    #[test]
    fn test_quota_status_serde() {
        let status = QuotaStatus {
            remaining: 4,
            total: 7,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"remaining":4,"total":7}"#);
    }
}
