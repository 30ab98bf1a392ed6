use std::cmp::Reverse;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::point::{Point, Range};

static NEXT_MARKER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a marker living on one [`PatchBuffer`](super::PatchBuffer) layer.
///
/// Ids are unique for the lifetime of the process, so a handle from one buffer can never
/// alias a marker on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(u64);

impl MarkerId {
    pub(super) fn next() -> Self {
        Self(NEXT_MARKER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

/// The independently queryable marker layers of a patch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerName {
    Unchanged,
    Addition,
    Deletion,
    NoNewline,
    Hunk,
    Patch,
}

impl LayerName {
    pub const ALL: [LayerName; 6] = [
        LayerName::Unchanged,
        LayerName::Addition,
        LayerName::Deletion,
        LayerName::NoNewline,
        LayerName::Hunk,
        LayerName::Patch,
    ];

    pub(super) const fn index(self) -> usize {
        match self {
            LayerName::Unchanged => 0,
            LayerName::Addition => 1,
            LayerName::Deletion => 2,
            LayerName::NoNewline => 3,
            LayerName::Hunk => 4,
            LayerName::Patch => 5,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LayerName::Unchanged => "unchanged",
            LayerName::Addition => "addition",
            LayerName::Deletion => "deletion",
            LayerName::NoNewline => "nonewline",
            LayerName::Hunk => "hunk",
            LayerName::Patch => "patch",
        }
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a marker reacts to insertions exactly at its boundaries.
///
/// Inclusive markers grow to cover text inserted at either boundary. Exclusive markers do
/// not; an empty exclusive marker is pushed past the inserted text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerOptions {
    pub exclusive: bool,
}

impl MarkerOptions {
    pub const INCLUSIVE: MarkerOptions = MarkerOptions { exclusive: false };

    pub const EXCLUSIVE: MarkerOptions = MarkerOptions { exclusive: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct MarkerState {
    pub layer: LayerName,
    pub range: Range,
    pub options: MarkerOptions,
}

impl MarkerState {
    /// Relocate after `[at, inserted_end]` was inserted.
    pub fn relocate_for_insert(&mut self, at: Point, inserted_end: Point) {
        let Range { start, end } = self.range;
        if self.options.exclusive && start == at && end == at {
            self.range = Range::empty_at(inserted_end);
            return;
        }

        let new_start = if start > at || (start == at && self.options.exclusive) {
            shift_for_insert(start, at, inserted_end)
        } else {
            start
        };
        let new_end = if end > at || (end == at && !self.options.exclusive) {
            shift_for_insert(end, at, inserted_end)
        } else {
            end
        };
        self.range = Range::new(new_start, new_end);
    }

    /// Relocate after `deleted` was removed.
    pub fn relocate_for_delete(&mut self, deleted: Range) {
        self.range = Range::new(
            shift_for_delete(self.range.start, deleted),
            shift_for_delete(self.range.end, deleted),
        );
    }
}

fn shift_for_insert(point: Point, at: Point, inserted_end: Point) -> Point {
    if point < at {
        point
    } else if point.row == at.row {
        Point::new(inserted_end.row, inserted_end.column + (point.column - at.column))
    } else {
        Point::new(point.row + (inserted_end.row - at.row), point.column)
    }
}

fn shift_for_delete(point: Point, deleted: Range) -> Point {
    if point <= deleted.start {
        point
    } else if point < deleted.end {
        deleted.start
    } else if point.row == deleted.end.row {
        Point::new(
            deleted.start.row,
            deleted.start.column + (point.column - deleted.end.column),
        )
    } else {
        Point::new(point.row - (deleted.end.row - deleted.start.row), point.column)
    }
}

/// Sort order for query results: by start, then longest first.
pub(super) fn ordering_key(range: &Range, id: MarkerId) -> (Point, Reverse<Point>, MarkerId) {
    (range.start, Reverse(range.end), id)
}

/// Start-sorted snapshot of one layer answering row-intersection queries in logarithmic time.
#[derive(Debug, Default)]
pub(super) struct LayerIndex {
    entries: Vec<(Range, MarkerId)>,
    max_end_row: Vec<usize>,
}

impl LayerIndex {
    pub fn build(mut entries: Vec<(Range, MarkerId)>) -> Self {
        entries.sort_by_key(|(range, id)| ordering_key(range, *id));
        let mut max_end_row = Vec::with_capacity(entries.len());
        let mut running = 0;
        for (range, _) in &entries {
            running = running.max(range.end.row);
            max_end_row.push(running);
        }
        Self {
            entries,
            max_end_row,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = MarkerId> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    pub fn intersecting_row(&self, row: usize) -> Vec<MarkerId> {
        let upper = self.entries.partition_point(|(range, _)| range.start.row <= row);
        let lower = self.max_end_row[..upper].partition_point(|max_end| *max_end < row);
        self.entries[lower..upper]
            .iter()
            .filter(|(range, _)| range.end.row >= row)
            .map(|(_, id)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(range: Range, exclusive: bool) -> MarkerState {
        MarkerState {
            layer: LayerName::Hunk,
            range,
            options: MarkerOptions { exclusive },
        }
    }

    #[test]
    fn insert_before_marker_shifts_rows() {
        let mut marker = state(Range::new((2, 1), (3, 4)), false);
        marker.relocate_for_insert(Point::new(1, 0), Point::new(3, 0));
        assert_eq!(marker.range, Range::new((4, 1), (5, 4)));
    }

    #[test]
    fn insert_on_start_row_shifts_start_column() {
        let mut marker = state(Range::new((0, 4), (1, 2)), false);
        marker.relocate_for_insert(Point::new(0, 2), Point::new(0, 5));
        assert_eq!(marker.range, Range::new((0, 7), (1, 2)));
    }

    #[test]
    fn inclusive_marker_grows_at_both_boundaries() {
        let mut marker = state(Range::new((1, 0), (1, 4)), false);
        marker.relocate_for_insert(Point::new(1, 4), Point::new(2, 0));
        assert_eq!(marker.range, Range::new((1, 0), (2, 0)));

        marker.relocate_for_insert(Point::new(1, 0), Point::new(1, 3));
        assert_eq!(marker.range, Range::new((1, 0), (2, 0)));
    }

    #[test]
    fn exclusive_marker_does_not_grow() {
        let mut marker = state(Range::new((1, 0), (1, 4)), true);
        marker.relocate_for_insert(Point::new(1, 4), Point::new(2, 0));
        assert_eq!(marker.range, Range::new((1, 0), (1, 4)));

        marker.relocate_for_insert(Point::new(1, 0), Point::new(2, 0));
        assert_eq!(marker.range, Range::new((2, 0), (2, 4)));
    }

    #[test]
    fn empty_exclusive_marker_moves_past_insertion() {
        let mut marker = state(Range::empty_at(Point::new(0, 0)), true);
        marker.relocate_for_insert(Point::new(0, 0), Point::new(3, 2));
        assert_eq!(marker.range, Range::empty_at(Point::new(3, 2)));
    }

    #[test]
    fn empty_inclusive_marker_swallows_insertion() {
        let mut marker = state(Range::empty_at(Point::new(0, 0)), false);
        marker.relocate_for_insert(Point::new(0, 0), Point::new(3, 2));
        assert_eq!(marker.range, Range::new((0, 0), (3, 2)));
    }

    #[test]
    fn delete_collapses_contained_points() {
        let mut marker = state(Range::new((1, 0), (4, 2)), false);
        marker.relocate_for_delete(Range::new((0, 3), (2, 0)));
        assert_eq!(marker.range, Range::new((0, 3), (2, 2)));

        let mut inside = state(Range::new((1, 0), (1, 2)), false);
        inside.relocate_for_delete(Range::new((0, 3), (2, 0)));
        assert_eq!(inside.range, Range::empty_at(Point::new(0, 3)));
    }

    #[test]
    fn delete_on_end_row_shifts_columns() {
        let mut marker = state(Range::new((2, 3), (2, 5)), false);
        marker.relocate_for_delete(Range::new((1, 1), (2, 1)));
        assert_eq!(marker.range, Range::new((1, 3), (1, 5)));
    }

    #[test]
    fn index_finds_markers_intersecting_row() {
        let a = MarkerId::next();
        let b = MarkerId::next();
        let c = MarkerId::next();
        let index = LayerIndex::build(vec![
            (Range::new((4, 0), (6, 1)), c),
            (Range::new((0, 0), (10, 0)), a),
            (Range::new((2, 0), (3, 1)), b),
        ]);
        assert_eq!(index.intersecting_row(3), vec![a, b]);
        assert_eq!(index.intersecting_row(5), vec![a, c]);
        assert_eq!(index.intersecting_row(11), Vec::<MarkerId>::new());
    }

    #[test]
    fn index_orders_longer_markers_first_at_same_start() {
        let empty = MarkerId::next();
        let full = MarkerId::next();
        let index = LayerIndex::build(vec![
            (Range::empty_at(Point::new(0, 0)), empty),
            (Range::new((0, 0), (3, 2)), full),
        ]);
        assert_eq!(index.intersecting_row(0), vec![full, empty]);
    }
}
