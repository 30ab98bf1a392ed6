use crate::buffer::{MarkerId, MarkerMap, PatchBuffer, Range};

use super::region::{Region, RegionKind};

/// One `@@` block: line-number bookkeeping plus the contiguous regions it spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    old_start_row: usize,
    old_row_count: usize,
    new_start_row: usize,
    new_row_count: usize,
    section_heading: String,
    marker: MarkerId,
    regions: Vec<Region>,
}

/// Line numbers of a hunk as written in its `@@` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start_row: usize,
    pub old_row_count: usize,
    pub new_start_row: usize,
    pub new_row_count: usize,
}

impl Hunk {
    #[must_use]
    pub fn new(header: HunkHeader, section_heading: impl Into<String>, marker: MarkerId, regions: Vec<Region>) -> Self {
        Self {
            old_start_row: header.old_start_row,
            old_row_count: header.old_row_count,
            new_start_row: header.new_start_row,
            new_row_count: header.new_row_count,
            section_heading: section_heading.into(),
            marker,
            regions,
        }
    }

    #[must_use]
    pub fn old_start_row(&self) -> usize {
        self.old_start_row
    }

    #[must_use]
    pub fn old_row_count(&self) -> usize {
        self.old_row_count
    }

    #[must_use]
    pub fn new_start_row(&self) -> usize {
        self.new_start_row
    }

    #[must_use]
    pub fn new_row_count(&self) -> usize {
        self.new_row_count
    }

    #[must_use]
    pub fn section_heading(&self) -> &str {
        &self.section_heading
    }

    #[must_use]
    pub fn marker(&self) -> MarkerId {
        self.marker
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Regions holding additions or deletions.
    pub fn changes(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|region| region.is_change())
    }

    #[must_use]
    pub fn range(&self, buffer: &PatchBuffer) -> Range {
        buffer.range_of(self.marker)
    }

    pub fn buffer_rows(&self, buffer: &PatchBuffer) -> std::ops::RangeInclusive<usize> {
        self.range(buffer).buffer_rows()
    }

    #[must_use]
    pub fn buffer_row_count(&self, buffer: &PatchBuffer) -> usize {
        self.range(buffer).row_count()
    }

    #[must_use]
    pub fn includes_buffer_row(&self, buffer: &PatchBuffer, row: usize) -> bool {
        self.range(buffer).intersects_row(row)
    }

    #[must_use]
    pub fn changed_line_count(&self, buffer: &PatchBuffer) -> usize {
        self.changes().map(|region| region.buffer_row_count(buffer)).sum()
    }

    /// Old-file line number shown at `row`, or `None` for rows without one (additions).
    #[must_use]
    pub fn old_row_at(&self, buffer: &PatchBuffer, row: usize) -> Option<usize> {
        self.row_at(buffer, row, self.old_start_row, |kind| {
            matches!(kind, RegionKind::Unchanged | RegionKind::Deletion)
        })
    }

    /// New-file line number shown at `row`, or `None` for rows without one (deletions).
    #[must_use]
    pub fn new_row_at(&self, buffer: &PatchBuffer, row: usize) -> Option<usize> {
        self.row_at(buffer, row, self.new_start_row, |kind| {
            matches!(kind, RegionKind::Unchanged | RegionKind::Addition)
        })
    }

    fn row_at(&self, buffer: &PatchBuffer, row: usize, start: usize, counts: impl Fn(RegionKind) -> bool) -> Option<usize> {
        let mut current = start;
        for region in &self.regions {
            let range = region.range(buffer);
            if range.intersects_row(row) {
                return counts(region.kind()).then(|| current + (row - range.start.row));
            }
            if counts(region.kind()) {
                current += range.row_count();
            }
        }
        None
    }

    /// Digits needed for the widest line number this hunk displays.
    #[must_use]
    pub fn max_line_number_width(&self) -> usize {
        let old_end = self.old_start_row + self.old_row_count;
        let new_end = self.new_start_row + self.new_row_count;
        old_end.max(new_end).to_string().len()
    }

    #[must_use]
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start_row, self.old_row_count, self.new_start_row, self.new_row_count
        )
    }

    #[must_use]
    pub fn to_string_in(&self, buffer: &PatchBuffer) -> String {
        let mut out = self.header();
        out.push('\n');
        for region in &self.regions {
            out.push_str(&region.to_string_in(buffer));
        }
        out
    }

    pub fn update_markers(&mut self, map: &MarkerMap) {
        if let Some(marker) = map.get(&self.marker) {
            self.marker = *marker;
        }
        for region in &mut self.regions {
            region.update_markers(map);
        }
    }

    pub fn destroy_markers(&self, buffer: &mut PatchBuffer) {
        buffer.destroy_marker(self.marker);
        for region in &self.regions {
            region.destroy_markers(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{LayerName, MarkerOptions};
    use similar_asserts::assert_eq;

    /// Rows: 0 unchanged, 1-2 addition, 3 deletion, 4 unchanged, 5 no-newline.
    fn sample() -> (PatchBuffer, Hunk) {
        let mut buffer = PatchBuffer::with_text("0000\n1111\n2222\n3333\n4444\n No newline at end of file");
        let mut region = |kind: RegionKind, first: usize, last: usize| {
            let marker = buffer.mark_range(kind.layer(), Range::rows(first, last), MarkerOptions::INCLUSIVE);
            Region::new(kind, marker)
        };
        let regions = vec![
            region(RegionKind::Unchanged, 0, 0),
            region(RegionKind::Addition, 1, 2),
            region(RegionKind::Deletion, 3, 3),
            region(RegionKind::Unchanged, 4, 4),
            region(RegionKind::NoNewline, 5, 5),
        ];
        let marker = buffer.mark_range(LayerName::Hunk, Range::rows(0, 5), MarkerOptions::INCLUSIVE);
        let header = HunkHeader {
            old_start_row: 10,
            old_row_count: 3,
            new_start_row: 20,
            new_row_count: 4,
        };
        (buffer, Hunk::new(header, "fn main()", marker, regions))
    }

    #[test]
    fn formats_header() {
        let (_, hunk) = sample();
        assert_eq!(hunk.header(), "@@ -10,3 +20,4 @@");
        assert_eq!(hunk.section_heading(), "fn main()");
    }

    #[test]
    fn counts_changed_lines() {
        let (buffer, hunk) = sample();
        assert_eq!(hunk.changed_line_count(&buffer), 3);
        assert_eq!(hunk.changes().count(), 2);
        assert_eq!(hunk.buffer_row_count(&buffer), 6);
    }

    #[test]
    fn maps_buffer_rows_to_old_rows() {
        let (buffer, hunk) = sample();
        let old_rows: Vec<_> = (0..7).map(|row| hunk.old_row_at(&buffer, row)).collect();
        assert_eq!(old_rows, vec![Some(10), None, None, Some(11), Some(12), None, None]);
    }

    #[test]
    fn maps_buffer_rows_to_new_rows() {
        let (buffer, hunk) = sample();
        let new_rows: Vec<_> = (0..7).map(|row| hunk.new_row_at(&buffer, row)).collect();
        assert_eq!(new_rows, vec![Some(20), Some(21), Some(22), None, Some(23), None, None]);
    }

    #[test]
    fn computes_line_number_width() {
        let (_, hunk) = sample();
        assert_eq!(hunk.max_line_number_width(), 2);

        let wide = Hunk::new(
            HunkHeader {
                old_start_row: 98,
                old_row_count: 5,
                new_start_row: 95,
                new_row_count: 3,
            },
            "",
            hunk.marker(),
            Vec::new(),
        );
        assert_eq!(wide.max_line_number_width(), 3);
    }

    #[test]
    fn renders_in_buffer() {
        let (buffer, hunk) = sample();
        insta::assert_snapshot!(hunk.to_string_in(&buffer), @r"
        @@ -10,3 +20,4 @@
         0000
        +1111
        +2222
        -3333
         4444
        \ No newline at end of file
        ");
    }

    #[test]
    fn destroys_all_markers() {
        let (mut buffer, hunk) = sample();
        hunk.destroy_markers(&mut buffer);
        for layer in LayerName::ALL {
            assert_eq!(buffer.marker_count(layer), 0);
        }
    }
}
