use std::collections::BTreeSet;
use std::fmt;

use crate::buffer::{LayerName, MarkerId, MarkerMap, MarkerOptions, PatchBuffer, Point, Range};

use super::hunk::{Hunk, HunkHeader};
use super::region::{Region, RegionKind};
use super::{PatchError, RenderStatus, Status};

/// Factory producing the concrete content of a hidden patch, along with the private
/// buffer its markers live on.
pub type Materialize = Box<dyn FnOnce() -> Result<(Patch, PatchBuffer), PatchError>>;

/// The content of one file's diff.
#[derive(Debug)]
pub enum Patch {
    /// Fully built hunks rendered into the buffer.
    Concrete(ConcretePatch),
    /// Content kept out of the buffer until it is expanded.
    Hidden(HiddenPatch),
    /// No patch at all.
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcretePatch {
    status: Status,
    hunks: Vec<Hunk>,
    marker: MarkerId,
    changed_line_count: usize,
}

impl ConcretePatch {
    #[must_use]
    pub fn new(status: Status, hunks: Vec<Hunk>, marker: MarkerId, buffer: &PatchBuffer) -> Self {
        let changed_line_count = hunks.iter().map(|hunk| hunk.changed_line_count(buffer)).sum();
        Self {
            status,
            hunks,
            marker,
            changed_line_count,
        }
    }
}

pub struct HiddenPatch {
    status: Status,
    marker: MarkerId,
    render_status: RenderStatus,
    show: Materialize,
}

impl HiddenPatch {
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn marker(&self) -> MarkerId {
        self.marker
    }

    /// Where the content goes once expanded.
    #[must_use]
    pub fn insertion_point(&self, buffer: &PatchBuffer) -> Point {
        buffer.range_of(self.marker).end
    }

    /// Build the concrete patch this stands in for.
    pub fn show(self) -> Result<(Patch, PatchBuffer), PatchError> {
        (self.show)()
    }
}

impl fmt::Debug for HiddenPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HiddenPatch")
            .field("status", &self.status)
            .field("marker", &self.marker)
            .field("render_status", &self.render_status)
            .finish_non_exhaustive()
    }
}

impl Patch {
    #[must_use]
    pub fn concrete(status: Status, hunks: Vec<Hunk>, marker: MarkerId, buffer: &PatchBuffer) -> Self {
        Patch::Concrete(ConcretePatch::new(status, hunks, marker, buffer))
    }

    #[must_use]
    pub fn hidden(
        status: Status,
        marker: MarkerId,
        render_status: RenderStatus,
        show: impl FnOnce() -> Result<(Patch, PatchBuffer), PatchError> + 'static,
    ) -> Self {
        Patch::Hidden(HiddenPatch {
            status,
            marker,
            render_status,
            show: Box::new(show),
        })
    }

    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            Patch::Concrete(patch) => Some(patch.status),
            Patch::Hidden(patch) => Some(patch.status),
            Patch::Null => None,
        }
    }

    #[must_use]
    pub fn marker(&self) -> Option<MarkerId> {
        match self {
            Patch::Concrete(patch) => Some(patch.marker),
            Patch::Hidden(patch) => Some(patch.marker),
            Patch::Null => None,
        }
    }

    #[must_use]
    pub fn range(&self, buffer: &PatchBuffer) -> Range {
        self.marker().map(|marker| buffer.range_of(marker)).unwrap_or_default()
    }

    #[must_use]
    pub fn start_range(&self, buffer: &PatchBuffer) -> Range {
        Range::empty_at(self.range(buffer).start)
    }

    #[must_use]
    pub fn hunks(&self) -> &[Hunk] {
        match self {
            Patch::Concrete(patch) => &patch.hunks,
            Patch::Hidden(_) | Patch::Null => &[],
        }
    }

    #[must_use]
    pub fn changed_line_count(&self) -> usize {
        match self {
            Patch::Concrete(patch) => patch.changed_line_count,
            Patch::Hidden(_) | Patch::Null => 0,
        }
    }

    #[must_use]
    pub fn render_status(&self) -> RenderStatus {
        match self {
            Patch::Hidden(patch) => patch.render_status,
            Patch::Concrete(_) | Patch::Null => RenderStatus::Expanded,
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        !matches!(self, Patch::Null)
    }

    #[must_use]
    pub fn contains_row(&self, buffer: &PatchBuffer, row: usize) -> bool {
        match self.marker() {
            Some(marker) => buffer.range_of(marker).intersects_row(row),
            None => false,
        }
    }

    #[must_use]
    pub fn max_line_number_width(&self) -> usize {
        self.hunks().last().map_or(0, Hunk::max_line_number_width)
    }

    /// Markers owned by this patch that sit at its start.
    #[must_use]
    pub fn starting_markers(&self) -> Vec<MarkerId> {
        let mut markers: Vec<MarkerId> = self.marker().into_iter().collect();
        if let Some(hunk) = self.hunks().first() {
            markers.push(hunk.marker());
            markers.extend(hunk.regions().first().map(Region::marker));
        }
        markers
    }

    /// Markers owned by this patch that sit at its end.
    #[must_use]
    pub fn ending_markers(&self) -> Vec<MarkerId> {
        let mut markers: Vec<MarkerId> = self.marker().into_iter().collect();
        if let Some(hunk) = self.hunks().last() {
            markers.push(hunk.marker());
            markers.extend(hunk.regions().last().map(Region::marker));
        }
        markers
    }

    /// Whole-row range of the first changed line, or the origin when nothing changed.
    #[must_use]
    pub fn first_change_range(&self, buffer: &PatchBuffer) -> Range {
        self.hunks()
            .first()
            .and_then(|hunk| hunk.changes().next())
            .map(|change| {
                let row = change.start_buffer_row(buffer);
                buffer.clip_range(Range::rows(row, row))
            })
            .unwrap_or_default()
    }

    /// Whether `rows` covers every changed line of this patch.
    #[must_use]
    pub fn selects_all_changes(&self, buffer: &PatchBuffer, rows: &BTreeSet<usize>) -> bool {
        let selected: usize = self
            .hunks()
            .iter()
            .flat_map(Hunk::changes)
            .map(|change| {
                let range = change.range(buffer);
                rows.range(range.start.row..=range.end.row).count()
            })
            .sum();
        selected == self.changed_line_count()
    }

    pub fn update_markers(&mut self, map: &MarkerMap) {
        match self {
            Patch::Concrete(patch) => {
                if let Some(marker) = map.get(&patch.marker) {
                    patch.marker = *marker;
                }
                for hunk in &mut patch.hunks {
                    hunk.update_markers(map);
                }
            }
            Patch::Hidden(patch) => {
                if let Some(marker) = map.get(&patch.marker) {
                    patch.marker = *marker;
                }
            }
            Patch::Null => {}
        }
    }

    pub fn destroy_markers(&self, buffer: &mut PatchBuffer) {
        if let Some(marker) = self.marker() {
            buffer.destroy_marker(marker);
        }
        for hunk in self.hunks() {
            hunk.destroy_markers(buffer);
        }
    }

    #[must_use]
    pub fn to_string_in(&self, buffer: &PatchBuffer) -> String {
        self.hunks().iter().map(|hunk| hunk.to_string_in(buffer)).collect()
    }

    /// Append a patch holding only the `rows` of this one to `next`, as it would be staged
    /// from the working tree into the index.
    ///
    /// Unselected additions are dropped and unselected deletions become context. Hunks
    /// without any selected change are left out and their line delta carried into the
    /// following hunks.
    #[must_use]
    pub fn build_stage_patch_for_lines(&self, original: &PatchBuffer, next: &mut PatchBuffer, rows: &BTreeSet<usize>) -> Patch {
        let Some(status) = self.status() else {
            return Patch::Null;
        };

        let start_row = next.last_row();
        let mut builder = BufferBuilder::new(original, self.range(original).start.row, next);
        let mut hunks = Vec::new();
        let mut new_row_delta: isize = 0;

        for hunk in self.hunks() {
            let mut selected_change = false;
            let mut selected_deletion_rows = 0;
            let mut no_newline_rows = 0;

            for region in hunk.regions() {
                for intersection in region.intersect_rows(original, rows, true) {
                    let range = intersection.range;
                    match (region.kind(), intersection.gap) {
                        (RegionKind::Addition, true) => builder.remove(range),
                        (RegionKind::Addition, false) => {
                            selected_change = true;
                            builder.append(range, RegionKind::Addition);
                        }
                        (RegionKind::Deletion, true) => builder.append(range, RegionKind::Unchanged),
                        (RegionKind::Deletion, false) => {
                            selected_change = true;
                            selected_deletion_rows += range.row_count();
                            builder.append(range, RegionKind::Deletion);
                        }
                        (RegionKind::Unchanged, _) => builder.append(range, RegionKind::Unchanged),
                        (RegionKind::NoNewline, _) => {
                            no_newline_rows += range.row_count();
                            builder.append(range, RegionKind::NoNewline);
                        }
                    }
                }
            }

            if selected_change {
                let (marker, regions) = builder.latest_hunk_was_included(hunk.range(original));
                let new_row_count =
                    builder.next.range_of(marker).row_count() - selected_deletion_rows - no_newline_rows;
                let header = HunkHeader {
                    old_start_row: hunk.old_start_row(),
                    old_row_count: hunk.old_row_count(),
                    new_start_row: hunk.new_start_row().saturating_add_signed(new_row_delta),
                    new_row_count,
                };
                new_row_delta += signed(new_row_count) - signed(hunk.new_row_count());
                hunks.push(Hunk::new(header, hunk.section_heading(), marker, regions));
            } else {
                new_row_delta += signed(hunk.old_row_count()) - signed(hunk.new_row_count());
                builder.latest_hunk_was_discarded();
            }
        }

        let whole_file = self.selects_all_changes(original, rows);
        let status = if status == Status::Deleted && !whole_file {
            Status::Modified
        } else {
            status
        };
        finish_derived(status, hunks, start_row, next)
    }

    /// Append a patch reverting the `rows` of this one to `next`, as it would be unstaged
    /// from the index back to the working tree.
    ///
    /// Selected additions become deletions and selected deletions become additions.
    /// Unselected additions turn into context and unselected deletions are dropped.
    #[must_use]
    pub fn build_unstage_patch_for_lines(&self, original: &PatchBuffer, next: &mut PatchBuffer, rows: &BTreeSet<usize>) -> Patch {
        let Some(status) = self.status() else {
            return Patch::Null;
        };

        let start_row = next.last_row();
        let mut builder = BufferBuilder::new(original, self.range(original).start.row, next);
        let mut hunks = Vec::new();
        let mut new_row_delta: isize = 0;

        for hunk in self.hunks() {
            let mut selected_change = false;
            let mut context_rows = 0;
            let mut addition_rows = 0;
            let mut deletion_rows = 0;

            for region in hunk.regions() {
                for intersection in region.intersect_rows(original, rows, true) {
                    let range = intersection.range;
                    match (region.kind(), intersection.gap) {
                        (RegionKind::Addition, true) => {
                            context_rows += range.row_count();
                            builder.append(range, RegionKind::Unchanged);
                        }
                        (RegionKind::Addition, false) => {
                            selected_change = true;
                            deletion_rows += range.row_count();
                            builder.append(range, RegionKind::Deletion);
                        }
                        (RegionKind::Deletion, true) => builder.remove(range),
                        (RegionKind::Deletion, false) => {
                            selected_change = true;
                            addition_rows += range.row_count();
                            builder.append(range, RegionKind::Addition);
                        }
                        (RegionKind::Unchanged, _) => {
                            context_rows += range.row_count();
                            builder.append(range, RegionKind::Unchanged);
                        }
                        (RegionKind::NoNewline, _) => builder.append(range, RegionKind::NoNewline),
                    }
                }
            }

            if selected_change {
                let (marker, regions) = builder.latest_hunk_was_included(hunk.range(original));
                let header = HunkHeader {
                    old_start_row: hunk.new_start_row(),
                    old_row_count: context_rows + deletion_rows,
                    new_start_row: hunk.new_start_row().saturating_add_signed(new_row_delta),
                    new_row_count: context_rows + addition_rows,
                };
                hunks.push(Hunk::new(header, hunk.section_heading(), marker, regions));
            } else {
                builder.latest_hunk_was_discarded();
            }

            new_row_delta += signed(addition_rows) - signed(deletion_rows);
        }

        let whole_file = self.selects_all_changes(original, rows);
        let status = match status {
            Status::Added if whole_file => Status::Deleted,
            Status::Added => Status::Modified,
            Status::Deleted => Status::Added,
            other => other,
        };
        finish_derived(status, hunks, start_row, next)
    }
}

fn signed(count: usize) -> isize {
    isize::try_from(count).unwrap_or(isize::MAX)
}

/// Mark the rows appended since `start_row` as one derived patch.
fn finish_derived(status: Status, hunks: Vec<Hunk>, start_row: usize, next: &mut PatchBuffer) -> Patch {
    let last_row = next.last_row();
    let marker = if last_row > start_row {
        next.mark_range(LayerName::Patch, Range::rows(start_row, last_row - 1), MarkerOptions::INCLUSIVE)
    } else {
        log::warn!("derived {status} patch has no selected changes");
        next.mark_position(LayerName::Patch, Point::row_start(start_row), MarkerOptions::EXCLUSIVE)
    };
    Patch::concrete(status, hunks, marker, next)
}

/// Copies selected rows of an existing patch into a new buffer, one hunk at a time,
/// tracking how far rows shift between the two.
struct BufferBuilder<'a> {
    original: &'a PatchBuffer,
    next: &'a mut PatchBuffer,
    offset: isize,
    hunk_text: String,
    hunk_row_count: usize,
    hunk_start_offset: isize,
    hunk_regions: Vec<(RegionKind, Range)>,
}

impl<'a> BufferBuilder<'a> {
    fn new(original: &'a PatchBuffer, base_row: usize, next: &'a mut PatchBuffer) -> Self {
        let offset = signed(next.last_row()) - signed(base_row);
        Self {
            original,
            next,
            offset,
            hunk_text: String::new(),
            hunk_row_count: 0,
            hunk_start_offset: offset,
            hunk_regions: Vec::new(),
        }
    }

    /// Copy `range` and mark it as `kind`, merging with a preceding run of the same kind.
    fn append(&mut self, range: Range, kind: RegionKind) {
        self.hunk_text.push_str(&self.original.text_in_range(range));
        self.hunk_text.push('\n');
        self.hunk_row_count += range.row_count();

        let translated = range.translate_rows(self.offset, self.offset);
        match self.hunk_regions.last_mut() {
            Some((last_kind, last_range)) if *last_kind == kind && translated.start.row == last_range.end.row + 1 => {
                last_range.end = translated.end;
            }
            _ => self.hunk_regions.push((kind, translated)),
        }
    }

    fn remove(&mut self, range: Range) {
        self.offset -= signed(range.row_count());
    }

    fn latest_hunk_was_included(&mut self, hunk_range: Range) -> (MarkerId, Vec<Region>) {
        self.next.append(&self.hunk_text);

        let regions = self
            .hunk_regions
            .drain(..)
            .map(|(kind, range)| {
                let marker = self.next.mark_range(kind.layer(), range, MarkerOptions::INCLUSIVE);
                Region::new(kind, marker)
            })
            .collect();

        let rows = Range::rows(
            hunk_range.start.row.saturating_add_signed(self.hunk_start_offset),
            hunk_range.end.row.saturating_add_signed(self.offset),
        );
        let marker = self.next.mark_range(LayerName::Hunk, rows, MarkerOptions::INCLUSIVE);

        self.reset();
        (marker, regions)
    }

    fn latest_hunk_was_discarded(&mut self) {
        self.offset -= signed(self.hunk_row_count);
        self.reset();
    }

    fn reset(&mut self) {
        self.hunk_text.clear();
        self.hunk_row_count = 0;
        self.hunk_start_offset = self.offset;
        self.hunk_regions.clear();
    }
}
