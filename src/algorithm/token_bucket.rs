//! Token bucket wrapper.
//!
//! The store-side script refills `limit / window` tokens per whole elapsed
//! second, capped at `limit`, then deducts one token when available. Refill
//! is deliberately quantized to integer seconds: a flood of sub-second calls
//! cannot fractionally refill between calls and inflate admissions.

use crate::algorithm::decode_verdict;
use crate::error::Result;
use crate::script::{ScriptKind, ScriptRunner};
use crate::verdict::Verdict;

/// Run one token-bucket decision for `key` at `now_ms`.
///
/// The bucket TTL (`2 x window`) is armed inside the script on every call.
pub(crate) async fn check(
    runner: &ScriptRunner,
    key: &str,
    limit: u64,
    window_secs: u64,
    now_ms: u64,
) -> Result<Verdict> {
    let args = [
        limit.to_string(),
        window_secs.to_string(),
        now_ms.to_string(),
    ];

    let reply = runner.invoke(ScriptKind::TokenBucket, &[key], &args).await?;
    decode_verdict(reply)
}
