use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::buffer::{LayerName, MarkerId, MarkerMap, MarkerOptions, PatchBuffer, Point, Range};
use crate::diff::RawDiff;

use super::file::{File, FileMode};
use super::hunk::Hunk;
use super::patch::Patch;
use super::{PatchError, RenderStatus, Status};

/// The diffs a [`FilePatch`] was built from, kept when building with `preserve_original`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPatches {
    pub content: RawDiff,
    /// The mode-change half of a paired symlink diff.
    pub mode: Option<RawDiff>,
}

/// Notification sent to subscribers when a file patch is collapsed or expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStatusChange {
    pub path: Option<String>,
    pub previous: RenderStatus,
    pub current: RenderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&RenderStatusChange)>;

/// Old and new [`File`] paired with the [`Patch`] between them.
pub struct FilePatch {
    old_file: File,
    new_file: File,
    patch: Patch,
    raw: Option<RawPatches>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl fmt::Debug for FilePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePatch")
            .field("old_file", &self.old_file)
            .field("new_file", &self.new_file)
            .field("patch", &self.patch)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl FilePatch {
    #[must_use]
    pub fn new(old_file: File, new_file: File, patch: Patch) -> Self {
        Self {
            old_file,
            new_file,
            patch,
            raw: None,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// A file patch with no files and no patch.
    #[must_use]
    pub fn null() -> Self {
        Self::new(File::null(), File::null(), Patch::Null)
    }

    #[must_use]
    pub fn with_raw_patches(mut self, raw: RawPatches) -> Self {
        self.raw = Some(raw);
        self
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.patch.is_present()
    }

    #[must_use]
    pub fn old_file(&self) -> &File {
        &self.old_file
    }

    #[must_use]
    pub fn new_file(&self) -> &File {
        &self.new_file
    }

    #[must_use]
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    #[must_use]
    pub fn old_path(&self) -> Option<&str> {
        self.old_file.path()
    }

    #[must_use]
    pub fn new_path(&self) -> Option<&str> {
        self.new_file.path()
    }

    /// The old path, or the new one for added files.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.old_path().or_else(|| self.new_path())
    }

    #[must_use]
    pub fn old_mode(&self) -> Option<FileMode> {
        self.old_file.mode()
    }

    #[must_use]
    pub fn new_mode(&self) -> Option<FileMode> {
        self.new_file.mode()
    }

    #[must_use]
    pub fn old_symlink(&self) -> Option<&str> {
        self.old_file.symlink()
    }

    #[must_use]
    pub fn new_symlink(&self) -> Option<&str> {
        self.new_file.symlink()
    }

    #[must_use]
    pub fn status(&self) -> Option<Status> {
        self.patch.status()
    }

    #[must_use]
    pub fn render_status(&self) -> RenderStatus {
        self.patch.render_status()
    }

    #[must_use]
    pub fn marker(&self) -> Option<MarkerId> {
        self.patch.marker()
    }

    #[must_use]
    pub fn range(&self, buffer: &PatchBuffer) -> Range {
        self.patch.range(buffer)
    }

    #[must_use]
    pub fn start_range(&self, buffer: &PatchBuffer) -> Range {
        self.patch.start_range(buffer)
    }

    #[must_use]
    pub fn hunks(&self) -> &[Hunk] {
        self.patch.hunks()
    }

    #[must_use]
    pub fn contains_row(&self, buffer: &PatchBuffer, row: usize) -> bool {
        self.patch.contains_row(buffer, row)
    }

    #[must_use]
    pub fn max_line_number_width(&self) -> usize {
        self.patch.max_line_number_width()
    }

    #[must_use]
    pub fn starting_markers(&self) -> Vec<MarkerId> {
        self.patch.starting_markers()
    }

    #[must_use]
    pub fn ending_markers(&self) -> Vec<MarkerId> {
        self.patch.ending_markers()
    }

    #[must_use]
    pub fn did_change_executable_mode(&self) -> bool {
        if !self.old_file.is_present() || !self.new_file.is_present() {
            return false;
        }
        self.old_file.is_executable() != self.new_file.is_executable()
    }

    #[must_use]
    pub fn has_symlink(&self) -> bool {
        self.old_symlink().is_some() || self.new_symlink().is_some()
    }

    /// Whether one side is a symlink and the other is not.
    #[must_use]
    pub fn has_typechange(&self) -> bool {
        if !self.old_file.is_present() || !self.new_file.is_present() {
            return false;
        }
        self.old_file.is_symlink() != self.new_file.is_symlink()
    }

    pub fn raw_patches(&self) -> Result<&RawPatches, PatchError> {
        self.raw.as_ref().ok_or_else(|| PatchError::MissingRawPatch {
            path: self.path().unwrap_or_default().to_string(),
        })
    }

    pub fn update_markers(&mut self, map: &MarkerMap) {
        self.patch.update_markers(map);
    }

    pub fn destroy_markers(&self, buffer: &mut PatchBuffer) {
        self.patch.destroy_markers(buffer);
    }

    // ---------------------------------------------------------------------
    // Render status notifications
    // ---------------------------------------------------------------------

    /// Call `observer` whenever this patch is collapsed or expanded.
    pub fn subscribe(&mut self, observer: impl FnMut(&RenderStatusChange) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.observers.retain(|(subscription, _)| *subscription != id);
    }

    fn did_change_render_status(&mut self, previous: RenderStatus) {
        let change = RenderStatusChange {
            path: self.path().map(str::to_string),
            previous,
            current: self.render_status(),
        };
        for (_, observer) in &mut self.observers {
            observer(&change);
        }
    }

    // ---------------------------------------------------------------------
    // Derived patches
    // ---------------------------------------------------------------------

    /// Derive the file patch that stages `rows` of this one, appending its content to `next`.
    #[must_use]
    pub fn build_stage_patch_for_lines(&self, original: &PatchBuffer, next: &mut PatchBuffer, rows: &BTreeSet<usize>) -> FilePatch {
        let new_file = if self.status() == Some(Status::Deleted) {
            if self.patch.selects_all_changes(original, rows) {
                File::null()
            } else {
                self.old_file.clone()
            }
        } else {
            self.new_file.clone()
        };

        let patch = self.patch.build_stage_patch_for_lines(original, next, rows);
        FilePatch::new(self.old_file.clone(), new_file, patch)
    }

    /// Derive the file patch that unstages `rows` of this one, appending its content to `next`.
    #[must_use]
    pub fn build_unstage_patch_for_lines(&self, original: &PatchBuffer, next: &mut PatchBuffer, rows: &BTreeSet<usize>) -> FilePatch {
        let present = if self.new_file.is_present() {
            &self.new_file
        } else {
            &self.old_file
        };
        let whole_file = self.patch.selects_all_changes(original, rows);

        let (old_file, new_file) = match self.status() {
            Some(Status::Added) if whole_file => (present.clone(), File::null()),
            Some(Status::Deleted) if whole_file => (File::null(), present.clone()),
            _ => (self.new_file.clone(), present.clone()),
        };

        let patch = self.patch.build_unstage_patch_for_lines(original, next, rows);
        FilePatch::new(old_file, new_file, patch)
    }

    // ---------------------------------------------------------------------
    // Rendering
    // ---------------------------------------------------------------------

    /// Unified diff text for this file. Typechanges are written as a deletion followed by an
    /// addition.
    #[must_use]
    pub fn to_string_in(&self, buffer: &PatchBuffer) -> String {
        if !self.is_present() {
            return String::new();
        }

        let status = self.status();
        if self.has_typechange() {
            let left_status = if self.old_file.is_symlink() {
                Some(Status::Deleted)
            } else {
                status
            };
            let right_status = if self.new_file.is_symlink() {
                Some(Status::Added)
            } else {
                status
            };
            let null = File::null();
            let mut out = self.render(&self.old_file, &null, left_status, buffer);
            out.push_str(&self.render(&null, &self.new_file, right_status, buffer));
            return out;
        }

        self.render(&self.old_file, &self.new_file, status, buffer)
    }

    fn render(&self, old_file: &File, new_file: &File, status: Option<Status>, buffer: &PatchBuffer) -> String {
        let mut out = header_string(old_file, new_file, status);
        match status {
            Some(Status::Added) if new_file.is_symlink() => {
                out.push_str("@@ -0,0 +1 @@\n");
                out.push_str(&format!("+{}\n", new_file.symlink().unwrap_or_default()));
                out.push_str("\\ No newline at end of file\n");
            }
            Some(Status::Deleted) if old_file.is_symlink() => {
                out.push_str("@@ -1 +0,0 @@\n");
                out.push_str(&format!("-{}\n", old_file.symlink().unwrap_or_default()));
                out.push_str("\\ No newline at end of file\n");
            }
            _ => out.push_str(&self.patch.to_string_in(buffer)),
        }
        out
    }

    // ---------------------------------------------------------------------
    // Collapse and expand
    // ---------------------------------------------------------------------

    /// Move this patch's content out of `buffer` into a private sub-buffer, leaving a
    /// zero-length marker in its place.
    ///
    /// `before` and `after` are neighbouring markers that touch this patch's boundaries; they
    /// stay where they are. Returns `false` if the patch was not visible.
    pub fn trigger_collapse_in(&mut self, buffer: &mut PatchBuffer, before: &[MarkerId], after: &[MarkerId]) -> bool {
        if !self.render_status().is_visible() {
            return false;
        }

        let previous = self.render_status();
        let mut old_patch = std::mem::replace(&mut self.patch, Patch::Null);
        let old_range = old_patch.range(buffer);
        let insertion_point = old_range.start;
        let exclude: HashSet<MarkerId> = before.iter().chain(after).copied().collect();

        let (sub_buffer, marker_map) = buffer.extract_patch_buffer(old_range, &exclude);
        old_patch.destroy_markers(buffer);
        old_patch.update_markers(&marker_map);

        // The separating newline goes with the content.
        if !old_range.is_empty() {
            buffer.delete_row(insertion_point.row);
        }

        let status = old_patch.status().unwrap_or(Status::Modified);
        let marker = buffer.mark_position(LayerName::Patch, insertion_point, MarkerOptions::EXCLUSIVE);
        self.patch = Patch::hidden(status, marker, RenderStatus::Collapsed, move || Ok((old_patch, sub_buffer)));

        log::debug!("collapsed {} at {insertion_point}", self.path().unwrap_or_default());
        self.did_change_render_status(previous);
        true
    }

    /// Materialize a hidden patch and insert its content back into `buffer` at the hidden
    /// patch's insertion point.
    ///
    /// Returns `Ok(false)` if the patch was already visible. A patch whose content can not be
    /// produced is left as [`RenderStatus::Removed`].
    pub fn trigger_expand_in(
        &mut self,
        buffer: &mut PatchBuffer,
        before: &[MarkerId],
        after: &[MarkerId],
    ) -> Result<bool, PatchError> {
        if self.render_status().is_visible() {
            return Ok(false);
        }

        let previous = self.render_status();
        let Patch::Hidden(hidden) = std::mem::replace(&mut self.patch, Patch::Null) else {
            return Ok(false);
        };
        let status = hidden.status();
        let hidden_marker = hidden.marker();
        let insertion_point = hidden.insertion_point(buffer);

        let (mut next_patch, sub_buffer) = match hidden.show() {
            Ok(shown) => shown,
            Err(error) => {
                let path = self.path().unwrap_or_default().to_string();
                self.patch = Patch::hidden(status, hidden_marker, RenderStatus::Removed, move || {
                    Err(PatchError::ExpandRemoved { path })
                });
                if previous != RenderStatus::Removed {
                    self.did_change_render_status(previous);
                }
                return Err(error);
            }
        };

        let at_start = insertion_point == Point::new(0, 0);
        let at_end = insertion_point == buffer.end_position();
        let will_have_content = !sub_buffer.is_empty();

        // Appending after existing content: the separating newline goes first, and empty
        // markers ending here move past it along with the new content.
        if will_have_content && at_end && !at_start {
            let (empty_before, non_empty_before): (Vec<MarkerId>, Vec<MarkerId>) = before
                .iter()
                .copied()
                .partition(|marker| buffer.range_of(*marker).is_empty());
            let mut inserter = buffer.create_inserter_at(insertion_point);
            inserter
                .keep_before(non_empty_before)
                .keep_after(after.iter().copied().chain(empty_before))
                .insert("\n");
            inserter.apply();
        }

        let insertion_point = buffer.range_of(hidden_marker).end;
        let mut inserter = buffer.create_inserter_at(insertion_point);
        inserter.keep_before(before.iter().copied()).keep_after(after.iter().copied());
        let map_id = inserter.insert_patch_buffer(&sub_buffer);
        inserter.insert_if(will_have_content && !at_end, "\n");
        let applied = inserter.apply();
        if let Some(map) = applied.marker_map(map_id) {
            next_patch.update_markers(map);
        }

        buffer.destroy_marker(hidden_marker);
        self.patch = next_patch;

        log::debug!("expanded {} at {insertion_point}", self.path().unwrap_or_default());
        self.did_change_render_status(previous);
        Ok(true)
    }
}

fn header_string(old_file: &File, new_file: &File, status: Option<Status>) -> String {
    let from = old_file.path().or(new_file.path()).unwrap_or_default();
    let to = new_file.path().or(old_file.path()).unwrap_or_default();

    let mut header = format!("diff --git a/{from} b/{to}\n");
    match status {
        Some(Status::Added) => {
            if let Some(mode) = new_file.mode() {
                header.push_str(&format!("new file mode {mode}\n"));
            }
        }
        Some(Status::Deleted) => {
            if let Some(mode) = old_file.mode() {
                header.push_str(&format!("deleted file mode {mode}\n"));
            }
        }
        _ => {}
    }
    match old_file.path() {
        Some(path) => header.push_str(&format!("--- a/{path}\n")),
        None => header.push_str("--- /dev/null\n"),
    }
    match new_file.path() {
        Some(path) => header.push_str(&format!("+++ b/{path}\n")),
        None => header.push_str("+++ /dev/null\n"),
    }
    header
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::model::hunk::HunkHeader;
    use crate::model::region::{Region, RegionKind};
    use similar_asserts::assert_eq;

    fn header(old_start_row: usize, old_row_count: usize, new_start_row: usize, new_row_count: usize) -> HunkHeader {
        HunkHeader {
            old_start_row,
            old_row_count,
            new_start_row,
            new_row_count,
        }
    }

    /// A patch made of hunks `(first_row, last_row, header, regions)` over `text`.
    fn patch_over(
        buffer: &mut PatchBuffer,
        status: Status,
        hunks: &[(usize, usize, HunkHeader, &[(RegionKind, usize, usize)])],
    ) -> Patch {
        let hunks: Vec<Hunk> = hunks
            .iter()
            .map(|(first, last, header, regions)| {
                let regions = regions
                    .iter()
                    .map(|(kind, first, last)| {
                        let marker = buffer.mark_range(kind.layer(), Range::rows(*first, *last), MarkerOptions::INCLUSIVE);
                        Region::new(*kind, marker)
                    })
                    .collect();
                let marker = buffer.mark_range(LayerName::Hunk, Range::rows(*first, *last), MarkerOptions::INCLUSIVE);
                Hunk::new(*header, "", marker, regions)
            })
            .collect();
        let last = hunks.last().map_or(0, |hunk| hunk.range(buffer).end.row);
        let marker = buffer.mark_range(LayerName::Patch, Range::rows(0, last), MarkerOptions::INCLUSIVE);
        Patch::concrete(status, hunks, marker, buffer)
    }

    fn rows(rows: &[usize]) -> BTreeSet<usize> {
        rows.iter().copied().collect()
    }

    fn deletion_of_three() -> (PatchBuffer, Patch) {
        let mut buffer = PatchBuffer::with_text("0000\n0001\n0002\n");
        let patch = patch_over(
            &mut buffer,
            Status::Deleted,
            &[(0, 2, header(1, 3, 1, 0), &[(RegionKind::Deletion, 0, 2)])],
        );
        (buffer, patch)
    }

    fn addition_of_three() -> (PatchBuffer, Patch) {
        let mut buffer = PatchBuffer::with_text("0000\n0001\n0002\n");
        let patch = patch_over(
            &mut buffer,
            Status::Added,
            &[(0, 2, header(1, 0, 1, 3), &[(RegionKind::Addition, 0, 2)])],
        );
        (buffer, patch)
    }

    #[test]
    fn accessors_delegate_to_files() {
        let file_patch = FilePatch::new(
            File::new("a.txt", FileMode::Normal),
            File::new("b.txt", FileMode::Executable).with_symlink("dest"),
            Patch::Null,
        );
        assert_eq!(file_patch.old_path(), Some("a.txt"));
        assert_eq!(file_patch.new_path(), Some("b.txt"));
        assert_eq!(file_patch.path(), Some("a.txt"));
        assert_eq!(file_patch.new_mode(), Some(FileMode::Executable));
        assert_eq!(file_patch.new_symlink(), Some("dest"));
        assert!(file_patch.did_change_executable_mode());
        assert!(file_patch.has_symlink());
        assert!(!file_patch.has_typechange());

        let added = FilePatch::new(File::null(), File::new("new.txt", FileMode::Normal), Patch::Null);
        assert_eq!(added.path(), Some("new.txt"));
        assert!(!added.did_change_executable_mode());
    }

    #[test]
    fn detects_typechanges() {
        let file_patch = FilePatch::new(
            File::new("a", FileMode::Symlink).with_symlink("b"),
            File::new("a", FileMode::Normal),
            Patch::Null,
        );
        assert!(file_patch.has_typechange());
    }

    #[test]
    fn null_file_patch_is_inert() {
        let file_patch = FilePatch::null();
        let buffer = PatchBuffer::new();
        let mut next = PatchBuffer::new();

        assert!(!file_patch.is_present());
        assert!(!file_patch.old_file().is_present());
        assert_eq!(file_patch.path(), None);
        assert_eq!(file_patch.status(), None);
        assert!(file_patch.hunks().is_empty());
        assert!(!file_patch.did_change_executable_mode());
        assert!(!file_patch.has_symlink());
        assert!(!file_patch.has_typechange());
        assert!(!file_patch.build_stage_patch_for_lines(&buffer, &mut next, &rows(&[0])).is_present());
        assert!(!file_patch.build_unstage_patch_for_lines(&buffer, &mut next, &rows(&[0])).is_present());
        assert_eq!(file_patch.to_string_in(&buffer), "");
    }

    #[test]
    fn raw_patches_require_preserved_originals() {
        let file_patch = FilePatch::new(File::new("a.txt", FileMode::Normal), File::null(), Patch::Null);
        assert!(matches!(
            file_patch.raw_patches(),
            Err(PatchError::MissingRawPatch { path }) if path == "a.txt"
        ));

        let raw = RawPatches {
            content: RawDiff::new(Status::Deleted),
            mode: None,
        };
        let file_patch = file_patch.with_raw_patches(raw.clone());
        assert_eq!(file_patch.raw_patches().unwrap(), &raw);
    }

    #[test]
    fn staging_part_of_a_deleted_file_keeps_the_file() {
        let (buffer, patch) = deletion_of_three();
        let old_file = File::new("file.txt", FileMode::Normal);
        let file_patch = FilePatch::new(old_file.clone(), File::null(), patch);

        let mut next = PatchBuffer::new();
        let staged = file_patch.build_stage_patch_for_lines(&buffer, &mut next, &rows(&[1, 2]));
        assert_eq!(staged.status(), Some(Status::Modified));
        assert_eq!(staged.old_file(), &old_file);
        assert_eq!(staged.new_file(), &old_file);
    }

    #[test]
    fn staging_all_of_a_deleted_file_drops_the_new_side() {
        let (buffer, patch) = deletion_of_three();
        let old_file = File::new("file.txt", FileMode::Normal);
        let replacement = File::new("file.txt", FileMode::Symlink);
        let file_patch = FilePatch::new(old_file.clone(), replacement, patch);

        let mut next = PatchBuffer::new();
        let staged = file_patch.build_stage_patch_for_lines(&buffer, &mut next, &rows(&[0, 1, 2]));
        assert_eq!(staged.status(), Some(Status::Deleted));
        assert_eq!(staged.old_file(), &old_file);
        assert!(!staged.new_file().is_present());
    }

    #[test]
    fn unstaging_part_of_an_added_file() {
        let (buffer, patch) = addition_of_three();
        let new_file = File::new("file.txt", FileMode::Normal);
        let file_patch = FilePatch::new(File::null(), new_file.clone(), patch);

        let mut next = PatchBuffer::new();
        let unstaged = file_patch.build_unstage_patch_for_lines(&buffer, &mut next, &rows(&[2]));
        assert_eq!(unstaged.status(), Some(Status::Modified));
        assert_eq!(unstaged.old_file(), &new_file);
        assert_eq!(unstaged.new_file(), &new_file);
    }

    #[test]
    fn unstaging_all_of_an_added_file_over_a_symlink() {
        let (buffer, patch) = addition_of_three();
        let new_file = File::new("file.txt", FileMode::Normal);
        let old_symlink = File::new("file.txt", FileMode::Symlink).with_symlink("wat.txt");
        let file_patch = FilePatch::new(old_symlink, new_file.clone(), patch);

        let mut next = PatchBuffer::new();
        let unstaged = file_patch.build_unstage_patch_for_lines(&buffer, &mut next, &rows(&[0, 1, 2]));
        assert_eq!(unstaged.status(), Some(Status::Deleted));
        assert_eq!(unstaged.old_file(), &new_file);
        assert!(!unstaged.new_file().is_present());
    }

    #[test]
    fn unstaging_a_removed_file_restores_it() {
        let (buffer, patch) = deletion_of_three();
        let old_file = File::new("file.txt", FileMode::Normal);
        let file_patch = FilePatch::new(old_file.clone(), File::null(), patch);

        for selection in [rows(&[1]), rows(&[0, 1, 2])] {
            let mut next = PatchBuffer::new();
            let unstaged = file_patch.build_unstage_patch_for_lines(&buffer, &mut next, &selection);
            assert_eq!(unstaged.status(), Some(Status::Added));
            assert!(!unstaged.old_file().is_present());
            assert_eq!(unstaged.new_file(), &old_file);
        }
    }

    #[test]
    fn renders_standard_diff_text() {
        let mut buffer = PatchBuffer::with_text("0000\n0001\n0002\n0003\n0004\n0005\n0006\n0007\n");
        let patch = patch_over(
            &mut buffer,
            Status::Modified,
            &[
                (0, 4, header(10, 4, 10, 3), &[
                    (RegionKind::Unchanged, 0, 0),
                    (RegionKind::Addition, 1, 1),
                    (RegionKind::Deletion, 2, 3),
                    (RegionKind::Unchanged, 4, 4),
                ]),
                (5, 7, header(20, 2, 20, 3), &[
                    (RegionKind::Unchanged, 5, 5),
                    (RegionKind::Addition, 6, 6),
                    (RegionKind::Unchanged, 7, 7),
                ]),
            ],
        );
        let file_patch = FilePatch::new(
            File::new("a.txt", FileMode::Normal),
            File::new("b.txt", FileMode::Executable),
            patch,
        );

        insta::assert_snapshot!(file_patch.to_string_in(&buffer), @r"
        diff --git a/a.txt b/b.txt
        --- a/a.txt
        +++ b/b.txt
        @@ -10,4 +10,3 @@
         0000
        +0001
        -0002
        -0003
         0004
        @@ -20,2 +20,3 @@
         0005
        +0006
         0007
        ");
    }

    #[test]
    fn renders_symlink_replaced_with_file() {
        let mut buffer = PatchBuffer::with_text("0000\n0001\n");
        let patch = patch_over(
            &mut buffer,
            Status::Added,
            &[(0, 1, header(1, 0, 1, 2), &[(RegionKind::Addition, 0, 1)])],
        );
        let file_patch = FilePatch::new(
            File::new("a.txt", FileMode::Symlink).with_symlink("dest.txt"),
            File::new("a.txt", FileMode::Normal),
            patch,
        );

        insta::assert_snapshot!(file_patch.to_string_in(&buffer), @r"
        diff --git a/a.txt b/a.txt
        deleted file mode 120000
        --- a/a.txt
        +++ /dev/null
        @@ -1 +0,0 @@
        -dest.txt
        \ No newline at end of file
        diff --git a/a.txt b/a.txt
        new file mode 100644
        --- /dev/null
        +++ b/a.txt
        @@ -1,0 +1,2 @@
        +0000
        +0001
        ");
    }

    #[test]
    fn renders_file_replaced_with_symlink() {
        let mut buffer = PatchBuffer::with_text("0000\n0001\n");
        let patch = patch_over(
            &mut buffer,
            Status::Deleted,
            &[(0, 1, header(1, 2, 1, 0), &[(RegionKind::Deletion, 0, 1)])],
        );
        let file_patch = FilePatch::new(
            File::new("a.txt", FileMode::Normal),
            File::new("a.txt", FileMode::Symlink).with_symlink("dest.txt"),
            patch,
        );

        insta::assert_snapshot!(file_patch.to_string_in(&buffer), @r"
        diff --git a/a.txt b/a.txt
        deleted file mode 100644
        --- a/a.txt
        +++ /dev/null
        @@ -1,2 +1,0 @@
        -0000
        -0001
        diff --git a/a.txt b/a.txt
        new file mode 120000
        --- /dev/null
        +++ b/a.txt
        @@ -0,0 +1 @@
        +dest.txt
        \ No newline at end of file
        ");
    }

    #[test]
    fn collapse_and_expand_announce_render_status() {
        let mut buffer = PatchBuffer::with_text("0000\n0001");
        let patch = patch_over(
            &mut buffer,
            Status::Modified,
            &[(0, 1, header(1, 1, 1, 2), &[(RegionKind::Unchanged, 0, 0), (RegionKind::Addition, 1, 1)])],
        );
        let mut file_patch = FilePatch::new(
            File::new("a.txt", FileMode::Normal),
            File::new("a.txt", FileMode::Normal),
            patch,
        );

        let changes = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&changes);
        let subscription = file_patch.subscribe(move |change| seen.borrow_mut().push(change.current));

        assert!(!file_patch.trigger_expand_in(&mut buffer, &[], &[]).unwrap());
        assert!(changes.borrow().is_empty());

        assert!(file_patch.trigger_collapse_in(&mut buffer, &[], &[]));
        assert_eq!(file_patch.render_status(), RenderStatus::Collapsed);
        assert_eq!(buffer.text(), "");
        assert!(!file_patch.trigger_collapse_in(&mut buffer, &[], &[]));

        assert!(file_patch.trigger_expand_in(&mut buffer, &[], &[]).unwrap());
        assert_eq!(file_patch.render_status(), RenderStatus::Expanded);
        assert_eq!(buffer.text(), "0000\n0001");
        assert_eq!(file_patch.range(&buffer), Range::new((0, 0), (1, 4)));
        assert_eq!(
            *changes.borrow(),
            vec![RenderStatus::Collapsed, RenderStatus::Expanded]
        );

        file_patch.unsubscribe(subscription);
        file_patch.trigger_collapse_in(&mut buffer, &[], &[]);
        assert_eq!(changes.borrow().len(), 2);
    }

    #[test]
    fn failed_expansion_leaves_patch_removed() {
        let mut buffer = PatchBuffer::new();
        let marker = buffer.mark_position(LayerName::Patch, Point::new(0, 0), MarkerOptions::INCLUSIVE);
        let patch = Patch::hidden(Status::Modified, marker, RenderStatus::Removed, || {
            Err(PatchError::ExpandRemoved {
                path: "gone.txt".to_string(),
            })
        });
        let mut file_patch = FilePatch::new(
            File::new("gone.txt", FileMode::Normal),
            File::new("gone.txt", FileMode::Normal),
            patch,
        );

        let result = file_patch.trigger_expand_in(&mut buffer, &[], &[]);
        assert!(matches!(result, Err(PatchError::ExpandRemoved { .. })));
        assert_eq!(file_patch.render_status(), RenderStatus::Removed);
        assert!(matches!(
            file_patch.trigger_expand_in(&mut buffer, &[], &[]),
            Err(PatchError::ExpandRemoved { path }) if path == "gone.txt"
        ));
    }
}
