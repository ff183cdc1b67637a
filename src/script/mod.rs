//! Store-side script sources.
//!
//! The four limiter algorithms run as atomic scripts inside the shared
//! store. This module holds their source text: [`ScriptRegistry`] loads the
//! scripts from a directory at startup (a missing file is fatal) or falls
//! back to the copies compiled into the crate. The registry is immutable for
//! the process lifetime; digest management lives in [`ScriptRunner`].

mod runner;

pub use runner::ScriptRunner;
pub(crate) use runner::into_store_error;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ConfigError, Result};

/// The four store-side scripts, one per limiter algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Fixed window counter with optional backoff (`rate-limit.lua`).
    RateLimit,
    /// Token bucket (`token-bucket.lua`).
    TokenBucket,
    /// Sliding window over a sorted set (`sliding-window.lua`).
    SlidingWindow,
    /// Leaky bucket (`leaky-bucket.lua`).
    LeakyBucket,
}

impl ScriptKind {
    /// All script kinds, in registry order.
    pub const ALL: [ScriptKind; 4] = [
        ScriptKind::RateLimit,
        ScriptKind::TokenBucket,
        ScriptKind::SlidingWindow,
        ScriptKind::LeakyBucket,
    ];

    /// Logical script name, which is also the on-disk file stem.
    pub fn name(self) -> &'static str {
        match self {
            ScriptKind::RateLimit => "rate-limit",
            ScriptKind::TokenBucket => "token-bucket",
            ScriptKind::SlidingWindow => "sliding-window",
            ScriptKind::LeakyBucket => "leaky-bucket",
        }
    }

    /// File name under the script directory.
    pub fn file_name(self) -> String {
        format!("{}.lua", self.name())
    }

    fn index(self) -> usize {
        match self {
            ScriptKind::RateLimit => 0,
            ScriptKind::TokenBucket => 1,
            ScriptKind::SlidingWindow => 2,
            ScriptKind::LeakyBucket => 3,
        }
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable mapping from script kind to source text.
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    sources: [Arc<str>; 4],
}

impl ScriptRegistry {
    /// Load the four scripts from `dir`.
    ///
    /// Each script must exist as `<name>.lua`; an absent or unreadable file
    /// is a fatal startup failure.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            sources: [
                read_source(dir, ScriptKind::RateLimit)?,
                read_source(dir, ScriptKind::TokenBucket)?,
                read_source(dir, ScriptKind::SlidingWindow)?,
                read_source(dir, ScriptKind::LeakyBucket)?,
            ],
        })
    }

    /// Registry backed by the script copies compiled into the crate.
    pub fn bundled() -> Self {
        Self {
            sources: [
                Arc::from(include_str!("../../scripts/rate-limit.lua")),
                Arc::from(include_str!("../../scripts/token-bucket.lua")),
                Arc::from(include_str!("../../scripts/sliding-window.lua")),
                Arc::from(include_str!("../../scripts/leaky-bucket.lua")),
            ],
        }
    }

    /// Source text for the given script.
    pub fn source(&self, kind: ScriptKind) -> &str {
        &self.sources[kind.index()]
    }
}

fn read_source(dir: &Path, kind: ScriptKind) -> Result<Arc<str>> {
    let path = dir.join(kind.file_name());
    let text = fs::read_to_string(&path).map_err(|_| ConfigError::MissingScript {
        name: kind.name(),
        path,
    })?;
    Ok(Arc::from(text.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_names() {
        assert_eq!(ScriptKind::RateLimit.file_name(), "rate-limit.lua");
        assert_eq!(ScriptKind::TokenBucket.name(), "token-bucket");
        assert_eq!(ScriptKind::SlidingWindow.to_string(), "sliding-window");
    }

    #[test]
    fn test_bundled_registry_complete() {
        let registry = ScriptRegistry::bundled();
        for kind in ScriptKind::ALL {
            assert!(
                !registry.source(kind).is_empty(),
                "{kind} should have source text"
            );
        }
    }

    #[test]
    fn test_bundled_scripts_use_expected_commands() {
        let registry = ScriptRegistry::bundled();

        let token_bucket = registry.source(ScriptKind::TokenBucket);
        assert!(token_bucket.contains("HMGET"));
        assert!(token_bucket.contains("last_refill"));

        let sliding_window = registry.source(ScriptKind::SlidingWindow);
        assert!(sliding_window.contains("ZREMRANGEBYSCORE"));
        assert!(sliding_window.contains("ZADD"));

        let leaky_bucket = registry.source(ScriptKind::LeakyBucket);
        assert!(leaky_bucket.contains("water"));

        let rate_limit = registry.source(ScriptKind::RateLimit);
        assert!(rate_limit.contains("INCR"));
        assert!(rate_limit.contains("PEXPIRE"));
        assert!(rate_limit.contains("PTTL"));
    }
}
