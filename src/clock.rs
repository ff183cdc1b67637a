//! Clock seam for decision timestamps.
//!
//! Every decision captures `now` exactly once and passes it to the store
//! script, so all arithmetic for that call references a single instant.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of integer milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    /// Current timestamp in milliseconds.
    fn now_ms(&self) -> u64;
}

/// System clock, the default for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as u64
    }
}

/// Manually advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock pinned at the given timestamp.
    pub fn starting_at(now_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            now_ms: AtomicU64::new(now_ms),
        })
    }

    /// Advance the clock by `delta_ms` milliseconds.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Pin the clock to an absolute timestamp.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);

        clock.set(10_000);
        assert_eq!(clock.now_ms(), 10_000);
    }

    #[test]
    fn test_system_clock_is_epoch_scale() {
        // Any plausible wall clock is far past 2020-01-01.
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
