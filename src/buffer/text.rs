use super::point::{Point, Range};

/// Line-oriented text storage. Always holds at least one (possibly empty) line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<String>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
        }
    }
}

impl TextBuffer {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    #[must_use]
    pub fn last_row(&self) -> usize {
        self.lines.len() - 1
    }

    #[must_use]
    pub fn line(&self, row: usize) -> Option<&str> {
        self.lines.get(row).map(String::as_str)
    }

    #[must_use]
    pub fn line_len(&self, row: usize) -> usize {
        self.lines.get(row).map_or(0, String::len)
    }

    #[must_use]
    pub fn end_position(&self) -> Point {
        let last = self.last_row();
        Point::new(last, self.line_len(last))
    }

    /// Clamp a point onto existing text. Rows past the end clip to the buffer end;
    /// columns past the line end (or inside a multi-byte character) clip backwards.
    #[must_use]
    pub fn clip_point(&self, point: Point) -> Point {
        if point.row > self.last_row() {
            return self.end_position();
        }
        let line = &self.lines[point.row];
        let mut column = point.column.min(line.len());
        while !line.is_char_boundary(column) {
            column -= 1;
        }
        Point::new(point.row, column)
    }

    #[must_use]
    pub fn clip_range(&self, range: Range) -> Range {
        Range::new(self.clip_point(range.start), self.clip_point(range.end))
    }

    #[must_use]
    pub fn text_in_range(&self, range: Range) -> String {
        let Range { start, end } = self.clip_range(range);
        if start.row == end.row {
            return self.lines[start.row][start.column..end.column].to_string();
        }
        let mut text = self.lines[start.row][start.column..].to_string();
        for line in &self.lines[start.row + 1..end.row] {
            text.push('\n');
            text.push_str(line);
        }
        text.push('\n');
        text.push_str(&self.lines[end.row][..end.column]);
        text
    }

    /// Insert `text` at an already clipped point, returning the end of the inserted text.
    pub fn insert(&mut self, at: Point, text: &str) -> Point {
        let suffix = self.lines[at.row].split_off(at.column);
        let mut pieces = text.split('\n');
        if let Some(first) = pieces.next() {
            self.lines[at.row].push_str(first);
        }
        let mut row = at.row;
        for piece in pieces {
            row += 1;
            self.lines.insert(row, piece.to_string());
        }
        let end = Point::new(row, self.lines[row].len());
        self.lines[row].push_str(&suffix);
        end
    }

    /// Remove the text in an already clipped range.
    pub fn delete(&mut self, range: Range) {
        let Range { start, end } = range;
        let tail = self.lines[end.row][end.column..].to_string();
        self.lines[start.row].truncate(start.column);
        self.lines[start.row].push_str(&tail);
        self.lines.drain(start.row + 1..=end.row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn empty_buffer_has_one_line() {
        let buffer = TextBuffer::default();
        assert!(buffer.is_empty());
        assert_eq!(buffer.last_row(), 0);
        assert_eq!(buffer.end_position(), Point::new(0, 0));
    }

    #[test]
    fn trailing_newline_yields_empty_last_row() {
        let buffer = TextBuffer::new("a\nb\n");
        assert_eq!(buffer.last_row(), 2);
        assert_eq!(buffer.line(2), Some(""));
    }

    #[test]
    fn insert_multi_line_text_mid_line() {
        let mut buffer = TextBuffer::new("0000\n1111");
        let end = buffer.insert(Point::new(0, 2), "xx\nyy\nzz");
        assert_eq!(end, Point::new(2, 2));
        assert_eq!(buffer.text(), "00xx\nyy\nzz00\n1111");
    }

    #[test]
    fn delete_across_rows_joins_lines() {
        let mut buffer = TextBuffer::new("0000\n1111\n2222");
        buffer.delete(Range::new((0, 2), (2, 1)));
        assert_eq!(buffer.text(), "00222");
    }

    #[test]
    fn text_in_range_clips_end_of_line() {
        let buffer = TextBuffer::new("0000\n1111\n2222");
        assert_eq!(buffer.text_in_range(Range::rows(1, 2)), "1111\n2222");
        assert_eq!(buffer.text_in_range(Range::rows(5, 9)), "");
    }

    #[test]
    fn clip_point_respects_char_boundaries() {
        let buffer = TextBuffer::new("añb");
        assert_eq!(buffer.clip_point(Point::new(0, 2)), Point::new(0, 1));
        assert_eq!(buffer.clip_point(Point::new(3, 0)), Point::new(0, 4));
    }
}
