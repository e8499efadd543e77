use crate::screen_line::Point;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u64);

/// Query filter for `SelectionModel::find_markers`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerFilter {
    /// Inclusive `(start_row, end_row)`; markers whose range touches any row in
    /// it match. `None` matches every marker.
    pub intersects_screen_row_range: Option<(u32, u32)>,
}

impl MarkerFilter {
    pub fn intersecting_rows(start_row: u32, end_row: u32) -> Self {
        Self {
            intersects_screen_row_range: Some((start_row, end_row)),
        }
    }
}

/// Selection / marker model the renderer reads cursors from.
pub trait SelectionModel {
    /// Markers matching `filter`, ordered by range start.
    fn find_markers(&self, filter: &MarkerFilter) -> Vec<MarkerId>;

    /// Marker of the primary ("last") cursor.
    fn last_cursor_marker(&self) -> Option<MarkerId>;

    fn head_screen_position(&self, marker: MarkerId) -> Option<Point>;

    fn subscribe(&self) -> watch::Receiver<u64>;
}

#[derive(Debug, Clone, Copy)]
struct Selection {
    id: MarkerId,
    tail: Point,
    head: Point,
}

impl Selection {
    fn start(&self) -> Point {
        self.tail.min(self.head)
    }

    fn end(&self) -> Point {
        self.tail.max(self.head)
    }
}

/// Screen-space cursor store. The most recently added cursor is primary.
pub struct CursorSet {
    selections: Vec<Selection>,
    next_id: u64,
    last: Option<MarkerId>,
    version: u64,
    changes: watch::Sender<u64>,
}

impl Default for CursorSet {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorSet {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            selections: Vec::new(),
            next_id: 1,
            last: None,
            version: 0,
            changes,
        }
    }

    /// Empty selection (caret) at `position`.
    pub fn add_cursor(&mut self, position: Point) -> MarkerId {
        self.add_selection(position, position)
    }

    pub fn add_selection(&mut self, tail: Point, head: Point) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        self.selections.push(Selection { id, tail, head });
        self.last = Some(id);
        self.bump();
        id
    }

    /// Move a cursor, collapsing its selection. Returns false for unknown ids.
    pub fn set_cursor_position(&mut self, id: MarkerId, position: Point) -> bool {
        match self.selections.iter_mut().find(|s| s.id == id) {
            Some(sel) => {
                sel.tail = position;
                sel.head = position;
                self.bump();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: MarkerId) -> bool {
        let before = self.selections.len();
        self.selections.retain(|s| s.id != id);
        if self.selections.len() == before {
            return false;
        }
        if self.last == Some(id) {
            self.last = self.selections.last().map(|s| s.id);
        }
        self.bump();
        true
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    fn bump(&mut self) {
        self.version += 1;
        self.changes.send_replace(self.version);
    }
}

impl SelectionModel for CursorSet {
    fn find_markers(&self, filter: &MarkerFilter) -> Vec<MarkerId> {
        let mut hits: Vec<&Selection> = self
            .selections
            .iter()
            .filter(|s| match filter.intersects_screen_row_range {
                Some((start_row, end_row)) => {
                    s.start().row <= end_row && s.end().row >= start_row
                }
                None => true,
            })
            .collect();
        hits.sort_by_key(|s| (s.start(), s.id));
        hits.into_iter().map(|s| s.id).collect()
    }

    fn last_cursor_marker(&self) -> Option<MarkerId> {
        self.last
    }

    fn head_screen_position(&self, marker: MarkerId) -> Option<Point> {
        self.selections
            .iter()
            .find(|s| s.id == marker)
            .map(|s| s.head)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_added_cursor_is_primary() {
        let mut set = CursorSet::new();
        let a = set.add_cursor(Point::new(3, 1));
        let b = set.add_cursor(Point::new(0, 0));
        assert_eq!(set.last_cursor_marker(), Some(b));
        assert!(set.remove(b));
        assert_eq!(set.last_cursor_marker(), Some(a));
    }

    #[test]
    fn find_markers_filters_and_sorts() {
        let mut set = CursorSet::new();
        let far = set.add_cursor(Point::new(40, 0));
        let near = set.add_cursor(Point::new(2, 5));
        let spanning = set.add_selection(Point::new(1, 0), Point::new(20, 3));
        let found = set.find_markers(&MarkerFilter::intersecting_rows(5, 10));
        assert_eq!(found, vec![spanning]);
        let found = set.find_markers(&MarkerFilter::intersecting_rows(0, 5));
        assert_eq!(found, vec![spanning, near]);
        let all = set.find_markers(&MarkerFilter::default());
        assert_eq!(all, vec![spanning, near, far]);
    }

    #[test]
    fn mutations_notify_subscribers() {
        let mut set = CursorSet::new();
        let mut rx = set.subscribe();
        assert!(!rx.has_changed().unwrap());
        let id = set.add_cursor(Point::new(0, 0));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert!(set.set_cursor_position(id, Point::new(1, 1)));
        assert!(rx.has_changed().unwrap());
        assert_eq!(set.head_screen_position(id), Some(Point::new(1, 1)));
        assert!(!set.set_cursor_position(MarkerId(99), Point::new(0, 0)));
    }
}
