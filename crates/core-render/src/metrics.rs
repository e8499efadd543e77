//! Update cycle metrics.
//!
//! Distinct from `SchedulerMetrics`, which counts *why* and *when* cycles were
//! requested. These counters record what the cycles actually did: commits,
//! measurement work and deferrals.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RenderCycleMetrics {
    /// Completed update cycles.
    pub cycles: AtomicU64,
    /// Cycles that found no measurements and deferred their work.
    pub deferred_unmeasured: AtomicU64,
    /// Cycles skipped or dropped because the view was hidden.
    pub suppressed_runs: AtomicU64,
    pub structural_commits: AtomicU64,
    pub position_commits: AtomicU64,
    /// Positions written to the cache (column 0 included).
    pub measured_columns: AtomicU64,
    /// Surface range queries issued by the position cache.
    pub measurement_queries: AtomicU64,
    pub cache_hits: AtomicU64,
    pub longest_line_measurements: AtomicU64,
    /// Cache lines dropped because their screen line left the render set.
    pub evicted_lines: AtomicU64,
    pub tiles_rendered: AtomicU64,
    /// Duration (ns) of the most recent completed cycle.
    pub last_cycle_ns: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderCycleMetricsSnapshot {
    pub cycles: u64,
    pub deferred_unmeasured: u64,
    pub suppressed_runs: u64,
    pub structural_commits: u64,
    pub position_commits: u64,
    pub measured_columns: u64,
    pub measurement_queries: u64,
    pub cache_hits: u64,
    pub longest_line_measurements: u64,
    pub evicted_lines: u64,
    pub tiles_rendered: u64,
    pub last_cycle_ns: u64,
}

impl RenderCycleMetrics {
    pub fn snapshot(&self) -> RenderCycleMetricsSnapshot {
        RenderCycleMetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            deferred_unmeasured: self.deferred_unmeasured.load(Ordering::Relaxed),
            suppressed_runs: self.suppressed_runs.load(Ordering::Relaxed),
            structural_commits: self.structural_commits.load(Ordering::Relaxed),
            position_commits: self.position_commits.load(Ordering::Relaxed),
            measured_columns: self.measured_columns.load(Ordering::Relaxed),
            measurement_queries: self.measurement_queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            longest_line_measurements: self.longest_line_measurements.load(Ordering::Relaxed),
            evicted_lines: self.evicted_lines.load(Ordering::Relaxed),
            tiles_rendered: self.tiles_rendered.load(Ordering::Relaxed),
            last_cycle_ns: self.last_cycle_ns.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}
