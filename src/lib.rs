//! Distributed rate limit decision engine for Rust.
//!
//! `flowgate` answers one question: given a bucket key and a policy, is this
//! request allowed, and how much quota is left? Verdicts are consistent
//! across any number of service replicas because every bucket lives in a
//! shared Redis-compatible store and every decision runs as a single atomic
//! store-side script. Replicas hold no per-bucket state.
//!
//! - **Four algorithms**: token bucket, sliding window, leaky bucket, and a
//!   fixed window with optional exponential backoff
//! - **Atomic by construction**: each decision is one script execution; two
//!   replicas racing on the same bucket cannot undercount or double-deduct
//! - **Digest-cached scripts**: scripts ship once and re-execute by digest,
//!   with transparent reload when the store drops its cache
//! - **Operational surface**: quota snapshots, bucket deletion, key scans,
//!   and a pub/sub hook for quota-violation broadcasts
//!
//! # Quick Start
//!
//! ```ignore
//! use flowgate::{RateLimiter, StoreConfig, Strategy};
//!
//! #[tokio::main]
//! async fn main() -> flowgate::Result<()> {
//!     let limiter = RateLimiter::connect(StoreConfig::new("redis://localhost:6379")).await?;
//!
//!     let verdict = limiter
//!         .check_rate_limit("tenant:42:search", 100, 60, Strategy::TokenBucket)
//!         .await?;
//!
//!     if verdict.is_allowed() {
//!         println!("allowed, {} remaining", verdict.remaining);
//!     } else {
//!         println!("denied until {}", verdict.reset_at);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Failure policy
//!
//! The engine never invents a verdict. When the store is unreachable the
//! caller receives the error and chooses fail-open or fail-closed; the one
//! exception is [`RateLimiter::get_quota_status`], a best-effort diagnostic
//! that reports zeros on failure.

pub mod algorithm;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod script;
pub mod verdict;

// Re-export main types
pub use algorithm::{FixedWindowOptions, Strategy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StoreConfig;
pub use error::{ConfigError, ConnectionError, RateLimitError, Result, StoreError};
pub use events::{EventBus, QuotaViolation};
pub use limiter::{RateLimiter, RateLimiterBuilder};
pub use script::{ScriptKind, ScriptRegistry, ScriptRunner};
pub use verdict::{FixedWindowStatus, QuotaStatus, Verdict};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::algorithm::{FixedWindowOptions, Strategy};
    pub use crate::config::StoreConfig;
    pub use crate::error::{RateLimitError, Result};
    pub use crate::limiter::RateLimiter;
    pub use crate::verdict::{FixedWindowStatus, QuotaStatus, Verdict};
}
