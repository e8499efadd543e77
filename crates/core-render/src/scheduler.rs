//! Update scheduler.
//!
//! Decides when an update cycle runs. Producers report changes via `mark`; the
//! returned `ScheduleAction` tells the engine what to do:
//!
//! * `Idle` + change -> `ScheduledCoalesced`, `RequestFrame` (exactly one frame
//!   request per batch).
//! * `ScheduledCoalesced` + change -> `Coalesced` (merged into the pending set).
//! * synchronous mode + change -> `RunNow` (`RunningSync` for the cycle).
//! * change while a cycle runs -> `Deferred`; a new batch is scheduled when
//!   the running cycle finishes. Cycles never re-enter.
//! * a batched cycle that could not run (surface not measurable yet) stays
//!   scheduled and requests another frame, so it retries on every frame until
//!   the surface can be measured. A synchronous one goes back to `Idle`.
//!
//! `cancel` (view hidden / detached) drops a scheduled batch so the frame
//! callback finds nothing to run. Pending change kinds are kept and replayed
//! when the view is shown again.
//!
//! Waiters registered through `await_next_update_applied` are resolved exactly
//! once, by the next cycle that completes.

use core_events::ChangeKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    ScheduledCoalesced,
    /// Batched cycle triggered by a frame callback.
    Running,
    RunningSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAction {
    RunNow,
    RequestFrame,
    Coalesced,
    Deferred,
}

/// Host hook for "call me back on the next batching boundary".
pub trait FrameRequester {
    fn request_frame(&self);
}

/// Requester that only counts; the host polls `is_scheduled` on its own tick.
#[derive(Debug, Default, Clone)]
pub struct CountingFrameRequester {
    requests: Arc<AtomicU64>,
}

impl CountingFrameRequester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl FrameRequester for CountingFrameRequester {
    fn request_frame(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    marks: AtomicU64,
    frame_requests: AtomicU64,
    coalesced: AtomicU64,
    deferred_marks: AtomicU64,
    suppressed: AtomicU64,
    cycles: AtomicU64,
    sync_cycles: AtomicU64,
    waiters_notified: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerMetricsSnapshot {
    pub marks: u64,
    pub frame_requests: u64,
    pub coalesced: u64,
    pub deferred_marks: u64,
    pub suppressed: u64,
    pub cycles: u64,
    pub sync_cycles: u64,
    pub waiters_notified: u64,
}

impl SchedulerMetrics {
    pub fn snapshot(&self) -> SchedulerMetricsSnapshot {
        use std::sync::atomic::Ordering::Relaxed;
        SchedulerMetricsSnapshot {
            marks: self.marks.load(Relaxed),
            frame_requests: self.frame_requests.load(Relaxed),
            coalesced: self.coalesced.load(Relaxed),
            deferred_marks: self.deferred_marks.load(Relaxed),
            suppressed: self.suppressed.load(Relaxed),
            cycles: self.cycles.load(Relaxed),
            sync_cycles: self.sync_cycles.load(Relaxed),
            waiters_notified: self.waiters_notified.load(Relaxed),
        }
    }

    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct UpdateScheduler {
    state: SchedulerState,
    pending: ChangeKind,
    synchronous: bool,
    waiters: Vec<oneshot::Sender<()>>,
    metrics: SchedulerMetrics,
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            pending: ChangeKind::empty(),
            synchronous: false,
            waiters: Vec::new(),
            metrics: SchedulerMetrics::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn pending(&self) -> ChangeKind {
        self.pending
    }

    pub fn is_scheduled(&self) -> bool {
        self.state == SchedulerState::ScheduledCoalesced
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    pub fn set_synchronous(&mut self, synchronous: bool) {
        self.synchronous = synchronous;
    }

    pub fn metrics_snapshot(&self) -> SchedulerMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn mark(&mut self, kind: ChangeKind) -> ScheduleAction {
        SchedulerMetrics::incr(&self.metrics.marks);
        self.pending |= kind;
        let action = match self.state {
            SchedulerState::Running | SchedulerState::RunningSync => {
                SchedulerMetrics::incr(&self.metrics.deferred_marks);
                ScheduleAction::Deferred
            }
            _ if self.synchronous => ScheduleAction::RunNow,
            SchedulerState::ScheduledCoalesced => {
                SchedulerMetrics::incr(&self.metrics.coalesced);
                ScheduleAction::Coalesced
            }
            SchedulerState::Idle => {
                self.state = SchedulerState::ScheduledCoalesced;
                SchedulerMetrics::incr(&self.metrics.frame_requests);
                ScheduleAction::RequestFrame
            }
        };
        tracing::trace!(target: "render.scheduler", ?kind, ?action, state = ?self.state, "update_mark");
        action
    }

    /// Record a change without scheduling anything (view hidden). The kinds
    /// are replayed by the next batch.
    pub fn note(&mut self, kind: ChangeKind) {
        self.pending |= kind;
        tracing::trace!(target: "render.scheduler", ?kind, "update_noted");
    }

    /// Enter a cycle and take the accumulated change kinds.
    pub fn begin_cycle(&mut self, synchronous: bool) -> ChangeKind {
        self.state = if synchronous {
            SchedulerMetrics::incr(&self.metrics.sync_cycles);
            SchedulerState::RunningSync
        } else {
            SchedulerState::Running
        };
        SchedulerMetrics::incr(&self.metrics.cycles);
        std::mem::take(&mut self.pending)
    }

    /// Complete a cycle: resolve waiters, then schedule a follow-up batch for
    /// changes marked while the cycle ran.
    pub fn finish_cycle(&mut self) -> Option<ScheduleAction> {
        self.state = SchedulerState::Idle;
        for waiter in self.waiters.drain(..) {
            SchedulerMetrics::incr(&self.metrics.waiters_notified);
            let _ = waiter.send(());
        }
        if self.pending.is_empty() {
            return None;
        }
        self.state = SchedulerState::ScheduledCoalesced;
        SchedulerMetrics::incr(&self.metrics.frame_requests);
        Some(ScheduleAction::RequestFrame)
    }

    /// Abort a cycle that could not do its work (no measurements yet). Change
    /// kinds go back to the pending set; waiters keep waiting. A batched cycle
    /// with pending changes asks for another frame.
    pub fn defer_cycle(&mut self, kinds: ChangeKind) -> Option<ScheduleAction> {
        self.pending |= kinds;
        let batched = self.state == SchedulerState::Running;
        if !batched || self.pending.is_empty() {
            self.state = SchedulerState::Idle;
            return None;
        }
        self.state = SchedulerState::ScheduledCoalesced;
        SchedulerMetrics::incr(&self.metrics.frame_requests);
        tracing::trace!(target: "render.scheduler", pending = ?self.pending, "deferred_cycle_rescheduled");
        Some(ScheduleAction::RequestFrame)
    }

    /// Drop a scheduled batch. Returns true when one was suppressed.
    pub fn cancel(&mut self) -> bool {
        if self.state != SchedulerState::ScheduledCoalesced {
            return false;
        }
        self.state = SchedulerState::Idle;
        SchedulerMetrics::incr(&self.metrics.suppressed);
        tracing::debug!(target: "render.scheduler", pending = ?self.pending, "scheduled_update_suppressed");
        true
    }

    /// Resolves when the next update cycle completes.
    pub fn await_next_update_applied(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        rx
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }
}
