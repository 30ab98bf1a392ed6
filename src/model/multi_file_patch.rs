use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::buffer::{LayerName, MarkerId, MarkerQuery, PatchBuffer, Range};

use super::PatchError;
use super::file_patch::FilePatch;
use super::hunk::Hunk;

/// Maps rows of a file's raw diff output to buffer rows.
///
/// Keys are the diff row just past each hunk body; values count the hunk headers up to and
/// including that hunk.
#[derive(Debug, Clone, Default)]
struct DiffRowOffsetIndex {
    start_row: usize,
    offsets: BTreeMap<usize, usize>,
}

/// Every [`FilePatch`] of one diff, rendered onto a single shared [`PatchBuffer`].
#[derive(Debug, Default)]
pub struct MultiFilePatch {
    buffer: PatchBuffer,
    file_patches: Vec<FilePatch>,
    by_marker: HashMap<MarkerId, usize>,
    by_path: HashMap<String, usize>,
    hunks_by_marker: HashMap<MarkerId, (usize, usize)>,
    diff_row_offsets: HashMap<String, DiffRowOffsetIndex>,
}

impl MultiFilePatch {
    /// Wrap `file_patches`, whose markers must all live on `buffer`.
    #[must_use]
    pub fn new(buffer: PatchBuffer, file_patches: Vec<FilePatch>) -> Self {
        let mut multi_file_patch = Self {
            buffer,
            file_patches,
            ..Self::default()
        };
        for index in 0..multi_file_patch.file_patches.len() {
            if let Some(path) = multi_file_patch.file_patches[index].path() {
                multi_file_patch.by_path.insert(path.to_string(), index);
            }
            multi_file_patch.index_markers(index);
            multi_file_patch.populate_diff_row_offsets(index);
        }
        multi_file_patch
    }

    /// An empty buffer with no file patches.
    #[must_use]
    pub fn null() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn buffer(&self) -> &PatchBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn file_patches(&self) -> &[FilePatch] {
        &self.file_patches
    }

    #[must_use]
    pub fn file_patch(&self, index: usize) -> Option<&FilePatch> {
        self.file_patches.get(index)
    }

    /// Mutable access for subscribing to render status changes.
    pub fn file_patch_mut(&mut self, index: usize) -> Option<&mut FilePatch> {
        self.file_patches.get_mut(index)
    }

    #[must_use]
    pub fn file_patch_index(&self, path: &str) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    #[must_use]
    pub fn patch_for_path(&self, path: &str) -> Option<&FilePatch> {
        self.file_patch_index(path).and_then(|index| self.file_patches.get(index))
    }

    /// Paths of every present old and new file.
    #[must_use]
    pub fn path_set(&self) -> BTreeSet<String> {
        self.file_patches
            .iter()
            .flat_map(|file_patch| [file_patch.old_file(), file_patch.new_file()])
            .filter(|file| file.is_present())
            .filter_map(|file| file.path().map(str::to_string))
            .collect()
    }

    #[must_use]
    pub fn get_file_patch_at(&self, row: usize) -> Option<&FilePatch> {
        self.file_patch_index_at(row).and_then(|index| self.file_patches.get(index))
    }

    fn file_patch_index_at(&self, row: usize) -> Option<usize> {
        if row > self.buffer.last_row() {
            return None;
        }
        let marker = self
            .buffer
            .find_markers(LayerName::Patch, MarkerQuery::IntersectsRow(row))
            .into_iter()
            .next()?;
        self.by_marker.get(&marker).copied()
    }

    #[must_use]
    pub fn get_hunk_at(&self, row: usize) -> Option<&Hunk> {
        let marker = self
            .buffer
            .find_markers(LayerName::Hunk, MarkerQuery::IntersectsRow(row))
            .into_iter()
            .next()?;
        let (file_index, hunk_index) = self.hunks_by_marker.get(&marker)?;
        self.file_patches.get(*file_index)?.hunks().get(*hunk_index)
    }

    // ---------------------------------------------------------------------
    // Derived patches
    // ---------------------------------------------------------------------

    /// A new multi-file patch staging only `rows`, over a fresh buffer.
    #[must_use]
    pub fn get_stage_patch_for_lines(&self, rows: &BTreeSet<usize>) -> MultiFilePatch {
        let mut next = PatchBuffer::new();
        let mut file_patches = Vec::new();
        for index in self.file_patches_containing(rows) {
            file_patches.push(self.file_patches[index].build_stage_patch_for_lines(&self.buffer, &mut next, rows));
        }
        MultiFilePatch::new(next, file_patches)
    }

    #[must_use]
    pub fn get_stage_patch_for_hunk(&self, hunk: &Hunk) -> MultiFilePatch {
        let rows = hunk.buffer_rows(&self.buffer).collect();
        self.get_stage_patch_for_lines(&rows)
    }

    /// A new multi-file patch unstaging only `rows`, over a fresh buffer.
    #[must_use]
    pub fn get_unstage_patch_for_lines(&self, rows: &BTreeSet<usize>) -> MultiFilePatch {
        let mut next = PatchBuffer::new();
        let mut file_patches = Vec::new();
        for index in self.file_patches_containing(rows) {
            file_patches.push(self.file_patches[index].build_unstage_patch_for_lines(&self.buffer, &mut next, rows));
        }
        MultiFilePatch::new(next, file_patches)
    }

    #[must_use]
    pub fn get_unstage_patch_for_hunk(&self, hunk: &Hunk) -> MultiFilePatch {
        let rows = hunk.buffer_rows(&self.buffer).collect();
        self.get_unstage_patch_for_lines(&rows)
    }

    /// Indices of the file patches owning at least one of `rows`, in row order.
    fn file_patches_containing(&self, rows: &BTreeSet<usize>) -> Vec<usize> {
        let mut found = Vec::new();
        let mut last: Option<usize> = None;
        for &row in rows {
            // Sorted rows mostly stay within the previous file patch.
            match last {
                Some(index) if self.file_patches[index].contains_row(&self.buffer, row) => continue,
                _ => {}
            }
            last = self.file_patch_index_at(row);
            match last {
                Some(index) if found.last() != Some(&index) => found.push(index),
                _ => {}
            }
        }
        found
    }

    #[must_use]
    pub fn spans_multiple_files(&self, rows: impl IntoIterator<Item = usize>) -> bool {
        let mut last: Option<usize> = None;
        for row in rows {
            match last {
                Some(index) if self.file_patches[index].contains_row(&self.buffer, row) => {}
                Some(_) => return true,
                None => last = self.file_patch_index_at(row),
            }
        }
        false
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    /// Number of unselected changed rows above the last selected row.
    ///
    /// After staging `rows`, this is the ordinal of the changed line the cursor should move to
    /// in the resulting patch; see [`MultiFilePatch::get_selection_range_for_index`].
    #[must_use]
    pub fn get_max_selection_index(&self, rows: &BTreeSet<usize>) -> usize {
        let Some(&last_max) = rows.last() else {
            return 0;
        };

        let mut selection_index = 0;
        for file_patch in &self.file_patches {
            for hunk in file_patch.hunks() {
                for change in hunk.changes() {
                    for intersection in change.intersect_rows(&self.buffer, rows, true) {
                        let range = intersection.range;
                        let includes_max = range.intersects_row(last_max);
                        let delta = if includes_max {
                            last_max - range.start.row + 1
                        } else {
                            range.row_count()
                        };
                        if intersection.gap {
                            selection_index += delta;
                        }
                        if includes_max {
                            return selection_index;
                        }
                    }
                }
            }
        }
        selection_index
    }

    /// Whole-row range of the changed line at ordinal `selection_index`, or of the last
    /// changed line when there are fewer.
    #[must_use]
    pub fn get_selection_range_for_index(&self, selection_index: usize) -> Range {
        let mut remaining = selection_index;
        let mut last_changed_row = 0;

        for file_patch in &self.file_patches {
            for hunk in file_patch.hunks() {
                for change in hunk.changes() {
                    let row_count = change.buffer_row_count(&self.buffer);
                    if remaining < row_count {
                        let row = change.start_buffer_row(&self.buffer) + remaining;
                        return self.buffer.clip_range(Range::rows(row, row));
                    }
                    remaining -= row_count;
                    last_changed_row = change.end_buffer_row(&self.buffer);
                }
            }
        }

        self.buffer.clip_range(Range::rows(last_changed_row, last_changed_row))
    }

    // ---------------------------------------------------------------------
    // Diff positions
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn is_diff_row_offset_index_empty(&self, path: &str) -> bool {
        self.diff_row_offsets
            .get(path)
            .is_none_or(|index| index.offsets.is_empty())
    }

    /// Translate a row of `path`'s raw diff output (1 being the line after the first hunk
    /// header) into a buffer row.
    ///
    /// Unknown paths and rows past the last hunk are logged and yield `None`.
    #[must_use]
    pub fn get_buffer_row_for_diff_position(&self, path: &str, diff_row: usize) -> Option<usize> {
        let Some(index) = self.diff_row_offsets.get(path) else {
            log::error!(
                "Attempt to compute buffer row for invalid diff position: file {path} not included (diff row {diff_row})"
            );
            return None;
        };
        let Some((_, offset)) = index.offsets.range(diff_row..).next() else {
            log::error!("Attempt to compute buffer row for invalid diff position: diff row {diff_row} out of range for {path}");
            return None;
        };
        let row = (index.start_row + diff_row).checked_sub(*offset);
        if row.is_none() {
            log::error!("Attempt to compute buffer row for invalid diff position: diff row {diff_row} precedes {path}");
        }
        row
    }

    /// Copy of at most `max_rows` buffer rows ending at `diff_row` of `path`, never reaching
    /// above the start of its hunk. Invalid positions yield an empty buffer.
    #[must_use]
    pub fn get_preview_patch_buffer(&self, path: &str, diff_row: usize, max_rows: usize) -> PatchBuffer {
        let Some(row) = self.get_buffer_row_for_diff_position(path, diff_row) else {
            return PatchBuffer::new();
        };
        let (Some(index), Some(hunk)) = (self.file_patch_index_at(row), self.get_hunk_at(row)) else {
            log::error!("No hunk at buffer row {row} for diff row {diff_row} of {path}");
            return PatchBuffer::new();
        };

        let start_row = (row + 1).saturating_sub(max_rows).max(hunk.range(&self.buffer).start.row);
        let exclude: HashSet<MarkerId> = self
            .markers_before(index)
            .into_iter()
            .chain(self.markers_after(index))
            .collect();

        let (preview, _) = self.buffer.create_sub_buffer(Range::rows(start_row, row), &exclude);
        preview
    }

    // ---------------------------------------------------------------------
    // Collapse and expand
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn is_patch_visible(&self, path: &str) -> bool {
        self.patch_for_path(path)
            .is_some_and(|file_patch| file_patch.render_status().is_visible())
    }

    /// Collapse the file patch at `index`. Returns `false` if it was not visible.
    pub fn collapse_file_patch(&mut self, index: usize) -> bool {
        if index >= self.file_patches.len() {
            return false;
        }

        self.unindex_markers(index);
        let before = self.markers_before(index);
        let after = self.markers_after(index);
        let collapsed = self.file_patches[index].trigger_collapse_in(&mut self.buffer, &before, &after);
        self.index_markers(index);
        collapsed
    }

    /// Expand the file patch at `index`. Returns `Ok(false)` if it was already visible.
    pub fn expand_file_patch(&mut self, index: usize) -> Result<bool, PatchError> {
        if index >= self.file_patches.len() {
            return Ok(false);
        }

        self.unindex_markers(index);
        let before = self.markers_before(index);
        let after = self.markers_after(index);
        let expanded = self.file_patches[index].trigger_expand_in(&mut self.buffer, &before, &after);
        self.index_markers(index);

        // Patches that started out hidden have no hunks to index diff rows by until now.
        if matches!(expanded, Ok(true)) {
            let path = self.file_patches[index].path().map(str::to_string);
            if let Some(path) = path {
                if self.is_diff_row_offset_index_empty(&path) {
                    self.populate_diff_row_offsets(index);
                }
            }
        }
        expanded
    }

    /// Ending markers of the preceding file patches, up to the nearest one with content.
    fn markers_before(&self, index: usize) -> Vec<MarkerId> {
        let mut before = Vec::new();
        for file_patch in self.file_patches[..index].iter().rev() {
            before.extend(file_patch.ending_markers());
            if !file_patch.range(&self.buffer).is_empty() {
                break;
            }
        }
        before
    }

    /// Starting markers of the following file patches, up to the nearest one with content.
    fn markers_after(&self, index: usize) -> Vec<MarkerId> {
        let mut after = Vec::new();
        for file_patch in self.file_patches.iter().skip(index + 1) {
            after.extend(file_patch.starting_markers());
            if !file_patch.range(&self.buffer).is_empty() {
                break;
            }
        }
        after
    }

    // ---------------------------------------------------------------------
    // Buffer ownership
    // ---------------------------------------------------------------------

    /// Move this patch onto `next`, replacing whatever `next` held. Every marker is carried
    /// over and the file patches are relinked in place.
    pub fn adopt_buffer(&mut self, mut next: PatchBuffer) {
        next.clear_all_layers();
        self.by_marker.clear();
        self.hunks_by_marker.clear();

        let marker_map = next.adopt(&self.buffer);
        for file_patch in &mut self.file_patches {
            file_patch.update_markers(&marker_map);
        }
        for index in 0..self.file_patches.len() {
            self.index_markers(index);
        }
        self.buffer = next;
    }

    fn index_markers(&mut self, index: usize) {
        let file_patch = &self.file_patches[index];
        if let Some(marker) = file_patch.marker() {
            self.by_marker.insert(marker, index);
        }
        for (hunk_index, hunk) in file_patch.hunks().iter().enumerate() {
            self.hunks_by_marker.insert(hunk.marker(), (index, hunk_index));
        }
    }

    fn unindex_markers(&mut self, index: usize) {
        let file_patch = &self.file_patches[index];
        if let Some(marker) = file_patch.marker() {
            self.by_marker.remove(&marker);
        }
        for hunk in file_patch.hunks() {
            self.hunks_by_marker.remove(&hunk.marker());
        }
    }

    fn populate_diff_row_offsets(&mut self, index: usize) {
        let file_patch = &self.file_patches[index];
        let Some(path) = file_patch.path() else {
            return;
        };

        let mut diff_row = 1;
        let mut offsets = BTreeMap::new();
        for (hunk_index, hunk) in file_patch.hunks().iter().enumerate() {
            diff_row += hunk.buffer_row_count(&self.buffer);
            offsets.insert(diff_row, hunk_index + 1);
            // Skip the next hunk header.
            diff_row += 1;
        }

        let start_row = file_patch.start_range(&self.buffer).start.row;
        self.diff_row_offsets
            .insert(path.to_string(), DiffRowOffsetIndex { start_row, offsets });
    }

    // ---------------------------------------------------------------------
    // Aggregate queries
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn any_present(&self) -> bool {
        self.file_patches.iter().any(FilePatch::is_present)
    }

    #[must_use]
    pub fn did_any_change_executable_mode(&self) -> bool {
        self.file_patches.iter().any(FilePatch::did_change_executable_mode)
    }

    #[must_use]
    pub fn any_have_typechange(&self) -> bool {
        self.file_patches.iter().any(FilePatch::has_typechange)
    }

    #[must_use]
    pub fn max_line_number_width(&self) -> usize {
        self.file_patches
            .iter()
            .map(FilePatch::max_line_number_width)
            .max()
            .unwrap_or(0)
    }
}

/// Apply-able unified diff text for every file patch.
impl fmt::Display for MultiFilePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file_patch in &self.file_patches {
            f.write_str(&file_patch.to_string_in(&self.buffer))?;
        }
        Ok(())
    }
}
