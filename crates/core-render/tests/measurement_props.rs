//! Property tests for the position cache sweep.

use core_model::{ScreenLine, TextDisplayModel};
use core_render::pending::PendingMeasurements;
use core_render::position_cache::HorizontalPositionCache;
use core_render::tree::{RenderedRows, TileBlock, ViewTree};
use core_render::{GridSurface, RenderSurface, build_line_tree};
use proptest::prelude::*;
use std::sync::Arc;

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!['a', 'b', ' ', '漢', 'ｶ', 'é']), 1..40)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Split `len` chars into positive run lengths.
fn runs_for(len: usize, cuts: &[usize]) -> Vec<i32> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % len).filter(|c| *c > 0).collect();
    points.sort_unstable();
    points.dedup();
    let mut codes = Vec::new();
    let mut last = 0;
    for p in points.into_iter().chain(std::iter::once(len)) {
        codes.push((p - last) as i32);
        last = p;
    }
    codes
}

fn committed(text: &str, codes: Vec<i32>) -> (GridSurface, RenderedRows) {
    let model = TextDisplayModel::new("");
    let line = Arc::new(build_line_tree(&ScreenLine::new(1, text, codes), &model));
    let mut rendered = RenderedRows::default();
    rendered.insert(0, Arc::clone(&line));
    let tree = ViewTree {
        tiles: vec![Some(TileBlock {
            slot: 0,
            start_row: 0,
            row_count: 1,
            top: 0.0,
            lines: vec![line],
        })],
        ..ViewTree::default()
    };
    let mut surface = GridSurface::new(8.0, 16.0, 640.0, 160.0);
    surface.commit(&tree);
    (surface, rendered)
}

proptest! {
    #[test]
    fn measuring_twice_is_free_and_stable(
        text in text_strategy(),
        cuts in prop::collection::vec(0usize..64, 0..5),
        columns in prop::collection::vec(0u32..48, 1..12),
    ) {
        let len = text.chars().count();
        let (surface, rendered) = committed(&text, runs_for(len, &cuts));
        let mut pending = PendingMeasurements::new();
        for c in &columns {
            pending.request(0, (*c).min(len as u32));
        }
        let mut cache = HorizontalPositionCache::new();
        let first = cache.measure(&pending, &rendered, &surface).unwrap();
        let snapshot: Vec<_> = (0..=len as u32).map(|c| cache.get(1, c)).collect();

        let second = cache.measure(&pending, &rendered, &surface).unwrap();
        prop_assert_eq!(second.surface_queries, 0);
        prop_assert_eq!(second.measured, 0);
        prop_assert_eq!(second.cache_hits, first.measured);
        let again: Vec<_> = (0..=len as u32).map(|c| cache.get(1, c)).collect();
        prop_assert_eq!(snapshot, again);
    }

    #[test]
    fn offsets_match_cell_widths_and_never_decrease(
        text in text_strategy(),
        cuts in prop::collection::vec(0usize..64, 0..5),
    ) {
        let len = text.chars().count();
        let (surface, rendered) = committed(&text, runs_for(len, &cuts));
        let mut pending = PendingMeasurements::new();
        for c in 0..=len as u32 {
            pending.request(0, c);
        }
        let mut cache = HorizontalPositionCache::new();
        let stats = cache.measure(&pending, &rendered, &surface).unwrap();
        prop_assert_eq!(stats.surface_queries, len as u64, "column 0 is free");
        prop_assert_eq!(cache.get(1, 0), Some(0.0));

        let mut expected = 0.0;
        let mut previous = 0.0;
        for (i, ch) in text.chars().enumerate() {
            expected += f64::from(core_text::char_cell_width(ch)) * 8.0;
            let offset = cache.get(1, i as u32 + 1).unwrap();
            prop_assert_eq!(offset, expected);
            prop_assert!(offset >= previous);
            previous = offset;
        }
    }
}
