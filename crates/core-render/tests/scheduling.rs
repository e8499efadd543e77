//! Update scheduling: frame batching, synchronous mode, visibility gating and
//! completion notification.

use core_events::ViewEvent;
use core_model::{CursorSet, Point, TextDisplayModel};
use core_render::{CountingFrameRequester, GridSurface, RenderEngine, ViewOptions};
use std::time::Duration;

type Engine = RenderEngine<TextDisplayModel, CursorSet, GridSurface>;

fn engine(requester: &CountingFrameRequester) -> Engine {
    let text: String = (0..100).map(|i| format!("line {i}\n")).collect();
    RenderEngine::new(
        TextDisplayModel::new(&text),
        CursorSet::new(),
        GridSurface::new(8.0, 16.0, 640.0, 160.0),
        ViewOptions::default(),
    )
    .with_frame_requester(Box::new(requester.clone()))
}

#[test]
fn burst_of_changes_runs_one_cycle() {
    let requester = CountingFrameRequester::new();
    let mut e = engine(&requester);
    e.did_show().unwrap();
    for i in 0..10 {
        e.did_scroll(f64::from(i) * 16.0, 0.0).unwrap();
    }
    e.did_focus().unwrap();
    e.did_change_model().unwrap();
    assert_eq!(requester.requests(), 1);
    assert!(e.on_frame().unwrap());
    assert_eq!(e.metrics_snapshot().cycles, 1);
    assert_eq!(e.surface().counters().structural_commits, 1);
    // Last scroll wins.
    assert_eq!(e.surface().scroll_offsets().0, 9.0 * 16.0);
    let sched = e.scheduler_metrics();
    assert_eq!(sched.frame_requests, 1);
    assert_eq!(sched.coalesced, 12);
}

#[test]
fn synchronous_mode_runs_every_change_immediately() {
    let requester = CountingFrameRequester::new();
    let mut e = engine(&requester);
    e.force_synchronous_updates(true);
    e.did_show().unwrap();
    e.did_scroll(16.0, 0.0).unwrap();
    e.did_scroll(32.0, 0.0).unwrap();
    assert_eq!(requester.requests(), 0);
    assert_eq!(e.metrics_snapshot().cycles, 3);
    assert_eq!(e.scheduler_metrics().sync_cycles, 3);
    assert!(!e.on_frame().unwrap());
}

#[test]
fn hidden_view_suppresses_and_replays_on_show() {
    let requester = CountingFrameRequester::new();
    let mut e = engine(&requester);
    e.did_show().unwrap();
    e.did_scroll(64.0, 0.0).unwrap();
    e.did_hide();
    assert!(!e.on_frame().unwrap(), "scheduled batch dropped");
    e.did_change_model().unwrap();
    assert_eq!(requester.requests(), 1, "hidden view requests nothing");
    assert_eq!(e.surface().counters().structural_commits, 0);
    assert_eq!(e.metrics_snapshot().suppressed_runs, 1);

    e.did_show().unwrap();
    assert!(e.on_frame().unwrap());
    assert_eq!(e.surface().scroll_offsets().0, 64.0, "scroll request survived");
}

#[test]
fn events_drive_the_engine() {
    let requester = CountingFrameRequester::new();
    let mut e = engine(&requester);
    e.selections_mut().add_cursor(Point::new(3, 2));
    let events = [
        ViewEvent::Shown,
        ViewEvent::Focus,
        ViewEvent::Scroll { top: 16.0, left: 0.0 },
        ViewEvent::Frame,
    ];
    for ev in &events {
        assert!(e.handle_event(ev).unwrap());
    }
    assert!(e.surface().is_focused());
    assert_eq!(e.cursors().len(), 1);
    assert_eq!(e.cursors()[0].pixel_top, 48.0);
    assert!(!e.handle_event(&ViewEvent::Shutdown).unwrap());
}

#[test]
fn frame_event_picks_up_model_notifications() {
    let requester = CountingFrameRequester::new();
    let mut e = engine(&requester);
    e.handle_event(&ViewEvent::Shown).unwrap();
    e.handle_event(&ViewEvent::Frame).unwrap();
    assert_eq!(e.metrics_snapshot().cycles, 1);

    e.display_mut().set_line(0, "changed");
    e.handle_event(&ViewEvent::Frame).unwrap();
    assert_eq!(e.metrics_snapshot().cycles, 2);
    assert_eq!(e.surface().row_text(0).as_deref(), Some("changed"));

    e.handle_event(&ViewEvent::Frame).unwrap();
    assert_eq!(e.metrics_snapshot().cycles, 2, "nothing changed");
}

#[tokio::test]
async fn await_next_update_applied_resolves_after_cycle() {
    let requester = CountingFrameRequester::new();
    let mut e = engine(&requester);
    e.did_show().unwrap();
    let applied = e.await_next_update_applied();
    e.did_scroll(32.0, 0.0).unwrap();
    assert!(e.on_frame().unwrap());
    tokio::time::timeout(Duration::from_secs(1), applied)
        .await
        .expect("update applied in time")
        .expect("sender kept until the cycle completed");
    assert_eq!(e.surface().scroll_offsets().0, 32.0);
}

#[tokio::test]
async fn deferred_cycle_keeps_waiters_until_measured() {
    let requester = CountingFrameRequester::new();
    let mut e = engine(&requester);
    e.surface_mut().set_attached(false);
    e.did_show().unwrap();
    let mut applied = e.await_next_update_applied();
    assert!(!e.on_frame().unwrap());
    assert!(applied.try_recv().is_err());
    assert_eq!(e.metrics_snapshot().deferred_unmeasured, 1);

    e.surface_mut().set_attached(true);
    e.did_resize().unwrap();
    assert!(e.on_frame().unwrap());
    tokio::time::timeout(Duration::from_secs(1), applied)
        .await
        .expect("update applied in time")
        .expect("resolved");
}

#[tokio::test]
async fn deferred_batch_retries_on_the_next_frame() {
    let requester = CountingFrameRequester::new();
    let mut e = engine(&requester);
    e.surface_mut().set_attached(false);
    e.did_show().unwrap();
    let applied = e.await_next_update_applied();
    assert!(!e.on_frame().unwrap());
    assert_eq!(requester.requests(), 2, "deferral asked for another frame");
    assert!(e.is_update_scheduled());

    // Still detached: the retry defers again and asks once more.
    assert!(!e.on_frame().unwrap());
    assert_eq!(requester.requests(), 3);

    // Attaching alone is enough; no other event is needed.
    e.surface_mut().set_attached(true);
    assert!(e.on_frame().unwrap());
    assert_eq!(requester.requests(), 3);
    assert!(!e.is_update_scheduled());
    tokio::time::timeout(Duration::from_secs(1), applied)
        .await
        .expect("update applied in time")
        .expect("resolved");
}
