use std::collections::BTreeSet;

use crate::buffer::{LayerName, MarkerId, MarkerMap, PatchBuffer, Range};

/// Change kind shared by every row of a [`Region`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Unchanged,
    Addition,
    Deletion,
    NoNewline,
}

impl RegionKind {
    /// Map a unified diff origin character to its kind.
    #[must_use]
    pub const fn from_origin(origin: char) -> Option<Self> {
        match origin {
            ' ' => Some(RegionKind::Unchanged),
            '+' => Some(RegionKind::Addition),
            '-' => Some(RegionKind::Deletion),
            '\\' => Some(RegionKind::NoNewline),
            _ => None,
        }
    }

    /// Character prefixed to each line in unified diff output.
    #[must_use]
    pub const fn origin(self) -> char {
        match self {
            RegionKind::Unchanged => ' ',
            RegionKind::Addition => '+',
            RegionKind::Deletion => '-',
            RegionKind::NoNewline => '\\',
        }
    }

    #[must_use]
    pub const fn layer(self) -> LayerName {
        match self {
            RegionKind::Unchanged => LayerName::Unchanged,
            RegionKind::Addition => LayerName::Addition,
            RegionKind::Deletion => LayerName::Deletion,
            RegionKind::NoNewline => LayerName::NoNewline,
        }
    }

    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(self, RegionKind::Addition | RegionKind::Deletion)
    }

    /// Swap additions and deletions.
    #[must_use]
    pub const fn invert(self) -> Self {
        match self {
            RegionKind::Addition => RegionKind::Deletion,
            RegionKind::Deletion => RegionKind::Addition,
            other => other,
        }
    }
}

/// A run of rows in a [`Hunk`](super::Hunk) sharing one [`RegionKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    kind: RegionKind,
    marker: MarkerId,
}

/// One piece of a region split by [`Region::intersect_rows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowIntersection {
    /// Whole rows covered by this piece.
    pub range: Range,
    /// Whether these rows are absent from the queried row set.
    pub gap: bool,
}

impl Region {
    #[must_use]
    pub fn new(kind: RegionKind, marker: MarkerId) -> Self {
        Self { kind, marker }
    }

    #[must_use]
    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    #[must_use]
    pub fn marker(&self) -> MarkerId {
        self.marker
    }

    #[must_use]
    pub fn is_addition(&self) -> bool {
        self.kind == RegionKind::Addition
    }

    #[must_use]
    pub fn is_deletion(&self) -> bool {
        self.kind == RegionKind::Deletion
    }

    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.kind == RegionKind::Unchanged
    }

    #[must_use]
    pub fn is_no_newline(&self) -> bool {
        self.kind == RegionKind::NoNewline
    }

    #[must_use]
    pub fn is_change(&self) -> bool {
        self.kind.is_change()
    }

    /// Same rows, with additions and deletions swapped.
    #[must_use]
    pub fn invert(&self) -> Self {
        Self::new(self.kind.invert(), self.marker)
    }

    #[must_use]
    pub fn range(&self, buffer: &PatchBuffer) -> Range {
        buffer.range_of(self.marker)
    }

    #[must_use]
    pub fn start_buffer_row(&self, buffer: &PatchBuffer) -> usize {
        self.range(buffer).start.row
    }

    #[must_use]
    pub fn end_buffer_row(&self, buffer: &PatchBuffer) -> usize {
        self.range(buffer).end.row
    }

    #[must_use]
    pub fn buffer_row_count(&self, buffer: &PatchBuffer) -> usize {
        self.range(buffer).row_count()
    }

    pub fn buffer_rows(&self, buffer: &PatchBuffer) -> std::ops::RangeInclusive<usize> {
        self.range(buffer).buffer_rows()
    }

    #[must_use]
    pub fn includes_buffer_row(&self, buffer: &PatchBuffer, row: usize) -> bool {
        self.range(buffer).intersects_row(row)
    }

    /// Split this region's rows into maximal runs that are in `rows` and runs that are not.
    ///
    /// Runs absent from `rows` are reported with `gap: true`, and only when `include_gaps` is
    /// set.
    #[must_use]
    pub fn intersect_rows(&self, buffer: &PatchBuffer, rows: &BTreeSet<usize>, include_gaps: bool) -> Vec<RowIntersection> {
        let range = self.range(buffer);
        let mut intersections = Vec::new();
        let mut run_start = range.start.row;
        let mut run_selected = rows.contains(&run_start);

        let mut finish = |first: usize, last: usize, selected: bool| {
            if selected || include_gaps {
                intersections.push(RowIntersection {
                    range: Range::rows(first, last),
                    gap: !selected,
                });
            }
        };

        for row in range.start.row + 1..=range.end.row {
            let selected = rows.contains(&row);
            if selected != run_selected {
                finish(run_start, row - 1, run_selected);
                run_start = row;
                run_selected = selected;
            }
        }
        finish(run_start, range.end.row, run_selected);

        intersections
    }

    /// Render each row prefixed with the origin character.
    #[must_use]
    pub fn to_string_in(&self, buffer: &PatchBuffer) -> String {
        let origin = self.kind.origin();
        self.buffer_rows(buffer).fold(String::new(), |mut out, row| {
            out.push(origin);
            out.push_str(buffer.line(row).unwrap_or_default());
            out.push('\n');
            out
        })
    }

    pub fn update_markers(&mut self, map: &MarkerMap) {
        if let Some(marker) = map.get(&self.marker) {
            self.marker = *marker;
        }
    }

    pub fn destroy_markers(&self, buffer: &mut PatchBuffer) {
        buffer.destroy_marker(self.marker);
    }
}
