//! Limiter algorithms and strategy dispatch.
//!
//! Each algorithm is a single atomic store-side script plus a thin outer
//! wrapper that supplies the call-site clock reading, assembles the argument
//! vector, and decodes the reply tuple. No wrapper holds per-bucket state.
//!
//! # Choosing a strategy
//!
//! | Strategy | Accounting | Best for |
//! |----------|------------|----------|
//! | Token Bucket | whole-second refill | bursty traffic |
//! | Sliding Window | exact admission timestamps | strict window accuracy |
//! | Leaky Bucket | continuous leak | smooth admission pacing |
//!
//! Fixed window sits outside the [`Strategy`] sum because its reply shape
//! differs; see [`FixedWindowOptions`].

pub(crate) mod fixed_window;
pub(crate) mod leaky_bucket;
pub(crate) mod sliding_window;
pub(crate) mod token_bucket;

pub use fixed_window::FixedWindowOptions;

use std::str::FromStr;

use deadpool_redis::redis::{Value, from_owned_redis_value};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, StoreError};
use crate::verdict::{FixedWindowStatus, Verdict};

/// The limiter algorithms sharing the uniform [`Verdict`] contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Refillable credit with whole-second refill quantization.
    TokenBucket,
    /// Exact timestamps in an ordered set; the window truly slides.
    SlidingWindow,
    /// Continuous leak accounting for smooth pacing.
    LeakyBucket,
}

impl Strategy {
    /// All strategies.
    pub const ALL: [Strategy; 3] = [
        Strategy::TokenBucket,
        Strategy::SlidingWindow,
        Strategy::LeakyBucket,
    ];

    /// Strategy name as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::TokenBucket => "token_bucket",
            Strategy::SlidingWindow => "sliding_window",
            Strategy::LeakyBucket => "leaky_bucket",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "token_bucket" => Ok(Strategy::TokenBucket),
            "sliding_window" => Ok(Strategy::SlidingWindow),
            "leaky_bucket" => Ok(Strategy::LeakyBucket),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Decode the `{allowed, remaining, reset_at}` reply tuple.
pub(crate) fn decode_verdict(value: Value) -> Result<Verdict> {
    let (allowed, remaining, reset_at): (i64, i64, i64) =
        from_owned_redis_value(value).map_err(|err| StoreError::BadReply(err.to_string()))?;

    Ok(Verdict {
        allowed: allowed == 1,
        remaining: remaining.max(0) as u64,
        reset_at: reset_at.max(0) as u64,
    })
}

/// Decode the fixed-window `{current, time_window}` reply tuple.
pub(crate) fn decode_fixed_window(value: Value) -> Result<FixedWindowStatus> {
    let (current, time_window): (i64, i64) =
        from_owned_redis_value(value).map_err(|err| StoreError::BadReply(err.to_string()))?;

    Ok(FixedWindowStatus {
        current: current.max(0) as u64,
        time_window_ms: time_window.max(0) as u64,
    })
}
