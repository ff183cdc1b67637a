//! Leaky bucket wrapper.
//!
//! Capacity equals the configured limit; the bucket leaks `limit / window`
//! units per second, continuously. Unlike the token bucket's whole-second
//! refill, leak accounting carries fractional seconds, which is what gives
//! the leaky bucket its smoother admission pacing.

use crate::algorithm::decode_verdict;
use crate::error::Result;
use crate::script::{ScriptKind, ScriptRunner};
use crate::verdict::Verdict;

/// Run one leaky-bucket decision for `key` at `now_ms`.
pub(crate) async fn check(
    runner: &ScriptRunner,
    key: &str,
    limit: u64,
    window_secs: u64,
    now_ms: u64,
) -> Result<Verdict> {
    let leak_rate = limit as f64 / window_secs as f64;

    let args = [limit.to_string(), leak_rate.to_string(), now_ms.to_string()];

    let reply = runner.invoke(ScriptKind::LeakyBucket, &[key], &args).await?;
    decode_verdict(reply)
}
