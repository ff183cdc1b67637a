//! Fixed window wrapper.
//!
//! The store-side script always increments the counter and reports
//! `{current, time_window}`; treating `current > max` as blocked is the
//! caller's policy. Three punishment modes are available for callers that
//! keep sending while over the limit.

use serde::{Deserialize, Serialize};

use crate::algorithm::decode_fixed_window;
use crate::error::Result;
use crate::script::{ScriptKind, ScriptRunner};
use crate::verdict::FixedWindowStatus;

/// Options for a fixed-window counter.
///
/// With both flags off, the window is armed on the first call and expires
/// silently. `continue_exceeding` re-arms the base window on every call made
/// while over the limit; `exponential_backoff` doubles the window per call
/// over the limit instead. When both are set, `continue_exceeding` wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWindowOptions {
    /// Window length in milliseconds.
    pub time_window_ms: u64,
    /// Admissions per window before the counter is considered over.
    pub max: u64,
    /// Re-arm the base window on every call while over the limit.
    pub continue_exceeding: bool,
    /// Extend the window exponentially per call over the limit.
    pub exponential_backoff: bool,
}

impl FixedWindowOptions {
    /// Create options with both punishment flags off.
    pub fn new(time_window_ms: u64, max: u64) -> Self {
        Self {
            time_window_ms,
            max,
            continue_exceeding: false,
            exponential_backoff: false,
        }
    }

    /// Re-arm the base window on every over-limit call.
    pub fn with_continue_exceeding(mut self) -> Self {
        self.continue_exceeding = true;
        self
    }

    /// Double the window per over-limit call.
    pub fn with_exponential_backoff(mut self) -> Self {
        self.exponential_backoff = true;
        self
    }
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

/// Run one fixed-window increment for `key`.
pub(crate) async fn check(
    runner: &ScriptRunner,
    key: &str,
    options: &FixedWindowOptions,
) -> Result<FixedWindowStatus> {
    let args = [
        options.time_window_ms.to_string(),
        options.max.to_string(),
        flag(options.continue_exceeding),
        flag(options.exponential_backoff),
    ];

    let reply = runner.invoke(ScriptKind::RateLimit, &[key], &args).await?;
    decode_fixed_window(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builders() {
        let options = FixedWindowOptions::new(60_000, 100);
        assert!(!options.continue_exceeding);
        assert!(!options.exponential_backoff);

        let options = options.with_exponential_backoff();
        assert!(options.exponential_backoff);

        let options = FixedWindowOptions::new(1_000, 1).with_continue_exceeding();
        assert!(options.continue_exceeding);
    }

    #[test]
    fn test_flag_encoding() {
        assert_eq!(flag(true), "1");
        assert_eq!(flag(false), "0");
    }
}
