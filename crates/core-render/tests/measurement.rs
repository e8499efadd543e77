//! Horizontal position measurement: caching, query economy, coordinate
//! origin and failure on stale rows.

use core_model::{CursorSet, Point, ScreenLine, TextDisplayModel};
use core_render::pending::PendingMeasurements;
use core_render::position_cache::HorizontalPositionCache;
use core_render::tree::RenderedRows;
use core_render::{GridSurface, RenderEngine, RenderError, ViewOptions, build_line_tree};
use std::sync::Arc;

type Engine = RenderEngine<TextDisplayModel, CursorSet, GridSurface>;

fn engine(text: &str, cursors: &[Point]) -> Engine {
    let mut set = CursorSet::new();
    for p in cursors {
        set.add_cursor(*p);
    }
    let mut e = RenderEngine::new(
        TextDisplayModel::new(text),
        set,
        GridSurface::new(8.0, 16.0, 640.0, 160.0),
        ViewOptions::default(),
    );
    e.force_synchronous_updates(true);
    e.did_show().unwrap();
    e
}

#[test]
fn column_zero_is_free() {
    let e = engine("abc\n\nxyz", &[Point::new(1, 0)]);
    let snap = e.metrics_snapshot();
    assert_eq!(snap.measurement_queries, 0);
    assert_eq!(snap.measured_columns, 1);
    assert_eq!(e.pixel_left_for(1, 0), Ok(0.0));
    assert_eq!(e.surface().counters().range_queries, 0);
}

#[test]
fn second_cycle_is_answered_from_the_cache() {
    let mut e = engine("hello world", &[Point::new(0, 4)]);
    let first = e.metrics_snapshot();
    assert_eq!(first.measurement_queries, 2, "columns 4 and 5");
    assert_eq!(e.pixel_left_for(0, 4), Ok(32.0));
    assert_eq!(e.pixel_left_for(0, 5), Ok(40.0));

    assert!(e.update_sync().unwrap());
    let second = e.metrics_snapshot();
    assert_eq!(second.cycles, 2);
    assert_eq!(second.measurement_queries, first.measurement_queries);
    assert_eq!(second.cache_hits, first.cache_hits + 2);
    assert_eq!(e.pixel_left_for(0, 4), Ok(32.0));
}

#[test]
fn positions_are_line_relative_under_horizontal_scroll() {
    let long = "x".repeat(200);
    let mut e = engine(&long, &[Point::new(0, 10)]);
    assert_eq!(e.cursors()[0].pixel_left, 80.0);

    e.did_scroll(0.0, 100.0).unwrap();
    assert_eq!(e.measurements().unwrap().scroll_left, 100.0);
    e.selections_mut().add_cursor(Point::new(0, 20));
    e.did_change_model().unwrap();

    assert_eq!(e.pixel_left_for(0, 10), Ok(80.0));
    assert_eq!(e.pixel_left_for(0, 20), Ok(160.0));
    let hidden = e.hidden_input().unwrap();
    assert_eq!(hidden.pixel_left, 60.0, "primary cursor minus scroll_left");
}

#[test]
fn lines_leaving_the_view_are_evicted() {
    let text: String = (0..200).map(|i| format!("line {i}\n")).collect();
    let mut e = engine(&text, &[Point::new(1, 2)]);
    assert!(e.position_cache().line_count() >= 1);
    assert!(e.pixel_left_for(1, 2).is_ok());

    e.did_scroll(100.0 * 16.0, 0.0).unwrap();
    assert_eq!(e.position_cache().line_count(), 0);
    assert!(e.metrics_snapshot().evicted_lines >= 1);
    assert_eq!(e.pixel_left_for(1, 2), Err(RenderError::StaleLine { row: 1 }));
}

#[test]
fn unknown_column_reports_missing_position() {
    let e = engine("abcdef", &[Point::new(0, 1)]);
    assert_eq!(
        e.pixel_left_for(0, 4),
        Err(RenderError::MissingPosition { row: 0, column: 4 })
    );
}

#[test]
fn pending_row_without_rendered_line_is_stale() {
    let surface = GridSurface::new(8.0, 16.0, 640.0, 160.0);
    let mut cache = HorizontalPositionCache::new();
    let mut pending = PendingMeasurements::new();
    pending.request(5, 1);
    let err = cache
        .measure(&pending, &RenderedRows::default(), &surface)
        .unwrap_err();
    assert_eq!(err, RenderError::StaleLine { row: 5 });
}

#[test]
fn rendered_line_missing_from_surface_is_stale() {
    let model = TextDisplayModel::new("");
    let surface = GridSurface::new(8.0, 16.0, 640.0, 160.0);
    let mut rendered = RenderedRows::default();
    rendered.insert(
        0,
        Arc::new(build_line_tree(&ScreenLine::new(77, "abc", vec![3]), &model)),
    );
    let mut cache = HorizontalPositionCache::new();
    let mut pending = PendingMeasurements::new();
    pending.request(0, 2);
    let err = cache.measure(&pending, &rendered, &surface).unwrap_err();
    assert_eq!(err, RenderError::StaleScreenLine { id: 77 });
    assert_eq!(cache.line_entry_count(77), 0);
}
