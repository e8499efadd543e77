//! Update cycle timing.
//!
//! Process-wide duration of the last completed update cycle in nanoseconds,
//! readable by the binary's diagnostics without a handle on the engine.
use std::sync::atomic::{AtomicU64, Ordering};

static LAST_CYCLE_NS: AtomicU64 = AtomicU64::new(0);

/// Record a cycle duration in nanoseconds.
pub fn record_last_cycle_ns(ns: u64) {
    LAST_CYCLE_NS.store(ns, Ordering::Relaxed);
}

/// Fetch the last recorded cycle duration in nanoseconds.
pub fn last_cycle_ns() -> u64 {
    LAST_CYCLE_NS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn store_and_load_nonzero() {
        record_last_cycle_ns(1234);
        // Engine tests in the same binary may record concurrently.
        assert!(last_cycle_ns() > 0);
    }
}
