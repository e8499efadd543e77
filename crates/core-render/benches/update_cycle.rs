use core_model::{CursorSet, Point, TextDisplayModel};
use core_render::{GridSurface, RenderEngine, ViewOptions};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn document(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("    let value_{i} = compute({i}, \"漢字\");\n"))
        .collect()
}

fn engine(lines: usize) -> RenderEngine<TextDisplayModel, CursorSet, GridSurface> {
    let mut cursors = CursorSet::new();
    for row in (0..lines as u32).step_by(7) {
        cursors.add_cursor(Point::new(row, 8));
    }
    let mut engine = RenderEngine::new(
        TextDisplayModel::new(&document(lines)),
        cursors,
        GridSurface::new(8.0, 16.0, 960.0, 640.0),
        ViewOptions::default(),
    );
    engine.force_synchronous_updates(true);
    let _ = engine.did_show();
    engine
}

fn bench_scroll(c: &mut Criterion) {
    let mut e = engine(5_000);
    let mut top = 0.0;
    c.bench_function("scroll_one_row", |b| {
        b.iter(|| {
            top = (top + 16.0) % 60_000.0;
            black_box(e.did_scroll(top, 0.0)).ok();
        })
    });
}

fn bench_jump(c: &mut Criterion) {
    let mut e = engine(5_000);
    let mut top = 0.0;
    c.bench_function("scroll_jump_page", |b| {
        b.iter(|| {
            top = (top + 6_400.0) % 70_000.0;
            black_box(e.did_scroll(top, 0.0)).ok();
        })
    });
}

fn bench_model_edit(c: &mut Criterion) {
    let mut e = engine(2_000);
    let mut n = 0usize;
    c.bench_function("edit_visible_line", |b| {
        b.iter(|| {
            n += 1;
            e.display_mut().set_line(3, format!("edited {n}"));
            black_box(e.did_change_model()).ok();
        })
    });
}

criterion_group!(benches, bench_scroll, bench_jump, bench_model_edit);
criterion_main!(benches);
