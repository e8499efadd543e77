//! Pending horizontal measurement requests.
//!
//! Write-only accumulator filled during an update cycle (longest line, cursor
//! columns) and consumed once by the position cache. Cleared at the start of
//! every cycle.
//!
//! Invariants:
//! * Rows iterate ascending; each row's columns iterate ascending and unique.
//! * Requesting the same `(row, column)` twice stores it once.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default, Clone)]
pub struct PendingMeasurements {
    rows: BTreeMap<u32, BTreeSet<u32>>,
}

impl PendingMeasurements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, row: u32, column: u32) {
        self.rows.entry(row).or_default().insert(column);
    }

    pub fn request_columns(&mut self, row: u32, columns: impl IntoIterator<Item = u32>) {
        self.rows.entry(row).or_default().extend(columns);
    }

    pub fn columns(&self, row: u32) -> Option<&BTreeSet<u32>> {
        self.rows.get(&row)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &BTreeSet<u32>)> {
        self.rows.iter().map(|(row, cols)| (*row, cols))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Total `(row, column)` pairs.
    pub fn len(&self) -> usize {
        self.rows.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupes_and_sorts() {
        let mut p = PendingMeasurements::new();
        p.request(4, 9);
        p.request(2, 3);
        p.request(4, 1);
        p.request(4, 9);
        p.request_columns(2, [3, 0]);
        let rows: Vec<_> = p
            .iter()
            .map(|(r, c)| (r, c.iter().copied().collect::<Vec<_>>()))
            .collect();
        assert_eq!(rows, vec![(2, vec![0, 3]), (4, vec![1, 9])]);
        assert_eq!(p.len(), 4);
        assert_eq!(p.row_count(), 2);
    }

    #[test]
    fn empty_after_clear() {
        let mut p = PendingMeasurements::new();
        p.request(0, 0);
        p.clear();
        assert!(p.is_empty());
        assert!(p.columns(0).is_none());
    }
}
