//! Sliding window wrapper.
//!
//! The store-side script keeps the exact timestamps of admitted calls in an
//! ordered set, evicts everything at or before `now - window`, and admits
//! while the cardinality is under the limit. The window truly slides rather
//! than stepping in buckets.
//!
//! Admission timestamps double as set members, so two admitted requests in
//! the same millisecond collapse into one member and undercount by one per
//! collision.

use crate::algorithm::decode_verdict;
use crate::error::Result;
use crate::script::{ScriptKind, ScriptRunner};
use crate::verdict::Verdict;

/// Run one sliding-window decision for `key` at `now_ms`.
pub(crate) async fn check(
    runner: &ScriptRunner,
    key: &str,
    limit: u64,
    window_secs: u64,
    now_ms: u64,
) -> Result<Verdict> {
    let window_ms = window_secs.saturating_mul(1000);
    let window_start = now_ms.saturating_sub(window_ms);

    let args = [
        limit.to_string(),
        window_start.to_string(),
        now_ms.to_string(),
        window_ms.to_string(),
    ];

    let reply = runner
        .invoke(ScriptKind::SlidingWindow, &[key], &args)
        .await?;
    decode_verdict(reply)
}
