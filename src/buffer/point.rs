use std::fmt;

/// Column value meaning "end of the line", clipped on use.
pub const END_OF_LINE: usize = usize::MAX;

/// A row/column position in a [`PatchBuffer`](super::PatchBuffer).
///
/// Columns are byte offsets into the row's text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

impl Point {
    #[must_use]
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// Start of `row`.
    #[must_use]
    pub const fn row_start(row: usize) -> Self {
        Self { row, column: 0 }
    }

    /// End of `row`, clipped to the line length when used.
    #[must_use]
    pub const fn row_end(row: usize) -> Self {
        Self {
            row,
            column: END_OF_LINE,
        }
    }

    /// Shift a point whose row is relative to the origin of another buffer so it lands
    /// relative to `base`. Only points on the first row pick up the base column.
    #[must_use]
    pub fn translate_from_origin(self, base: Point) -> Self {
        if self.row == 0 {
            Self::new(base.row, base.column.saturating_add(self.column))
        } else {
            Self::new(base.row + self.row, self.column)
        }
    }

    /// Inverse of [`Point::translate_from_origin`].
    #[must_use]
    pub fn translate_to_origin(self, base: Point) -> Self {
        if self.row == base.row {
            Self::new(0, self.column.saturating_sub(base.column))
        } else {
            Self::new(self.row.saturating_sub(base.row), self.column)
        }
    }
}

impl From<(usize, usize)> for Point {
    fn from((row, column): (usize, usize)) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.column == END_OF_LINE {
            write!(f, "[{}, ∞]", self.row)
        } else {
            write!(f, "[{}, {}]", self.row, self.column)
        }
    }
}

/// A `[start, end]` span between two points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Point,
    pub end: Point,
}

impl Range {
    #[must_use]
    pub fn new(start: impl Into<Point>, end: impl Into<Point>) -> Self {
        let (start, end) = (start.into(), end.into());
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Zero-length range at `point`.
    #[must_use]
    pub fn empty_at(point: Point) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    /// Range covering whole rows `first..=last`.
    #[must_use]
    pub fn rows(first: usize, last: usize) -> Self {
        Self::new(Point::row_start(first), Point::row_end(last))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Number of rows touched, counting both endpoints.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.end.row - self.start.row + 1
    }

    #[must_use]
    pub fn intersects_row(&self, row: usize) -> bool {
        self.start.row <= row && row <= self.end.row
    }

    /// Buffer rows spanned by this range.
    pub fn buffer_rows(&self) -> std::ops::RangeInclusive<usize> {
        self.start.row..=self.end.row
    }

    /// Whether `other` touches this range, boundaries included.
    #[must_use]
    pub fn intersects(&self, other: &Range) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Shift both rows by a signed offset.
    #[must_use]
    pub fn translate_rows(&self, start_delta: isize, end_delta: isize) -> Self {
        Self {
            start: Point::new(self.start.row.saturating_add_signed(start_delta), self.start.column),
            end: Point::new(self.end.row.saturating_add_signed(end_delta), self.end.column),
        }
    }
}

impl<S: Into<Point>, E: Into<Point>> From<(S, E)> for Range {
    fn from((start, end): (S, E)) -> Self {
        Self::new(start, end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.start, self.end)
    }
}
