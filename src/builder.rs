//! Assembling a [`MultiFilePatch`] from raw per-file diffs.
//!
//! Every file's hunks are rendered one after the other onto a single [`PatchBuffer`]:
//! regions are separated by unmarked line breaks, and so are hunks and file patches.
//! Diffs over [`BuildOptions::large_diff_threshold`] lines are not rendered at all until
//! they are expanded.
//!
//! # Examples
//!
//! ```
//! use patch_model::builder::{BuildOptions, build_multi_file_patch};
//! use patch_model::parse::parse_diffs;
//!
//! let diffs = parse_diffs(
//!     "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1,1 +1,2 @@\n one\n+two\n",
//! )
//! .unwrap();
//! let mfp = build_multi_file_patch(&diffs, &BuildOptions::default()).unwrap();
//!
//! assert_eq!(mfp.buffer().text(), "one\ntwo");
//! assert_eq!(mfp.file_patches()[0].hunks()[0].header(), "@@ -1,1 +1,2 @@");
//! ```

use std::collections::HashMap;

use crate::buffer::{BlueprintId, LayerName, MarkerId, MarkerOptions, PatchBuffer};
use crate::diff::{RawDiff, RawHunk};
use crate::model::{
    BuildError, File, FileMode, FilePatch, Hunk, HunkHeader, MultiFilePatch, Patch, PatchError, RawPatches, Region,
    RegionKind, RenderStatus, Status,
};

/// Diffs with more body lines than this are deferred by default.
pub const DEFAULT_LARGE_DIFF_THRESHOLD: usize = 800;

/// Knobs for [`build_multi_file_patch`] and [`build_file_patch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Diffs with more body lines than this start out [`RenderStatus::Deferred`].
    pub large_diff_threshold: usize,
    /// Initial render status per path, taking precedence over the threshold.
    pub render_status_overrides: HashMap<String, RenderStatus>,
    /// Keep the raw diffs around for [`FilePatch::raw_patches`].
    pub preserve_original: bool,
    /// Paths that no longer exist; each gets a content-less [`RenderStatus::Removed`] patch.
    pub removed: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            large_diff_threshold: DEFAULT_LARGE_DIFF_THRESHOLD,
            render_status_overrides: HashMap::new(),
            preserve_original: false,
            removed: Vec::new(),
        }
    }
}

impl BuildOptions {
    #[must_use]
    pub fn with_large_diff_threshold(mut self, threshold: usize) -> Self {
        self.large_diff_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_render_status(mut self, path: impl Into<String>, status: RenderStatus) -> Self {
        self.render_status_overrides.insert(path.into(), status);
        self
    }

    #[must_use]
    pub fn with_preserve_original(mut self, preserve: bool) -> Self {
        self.preserve_original = preserve;
        self
    }

    #[must_use]
    pub fn with_removed(mut self, path: impl Into<String>) -> Self {
        self.removed.push(path.into());
        self
    }

    fn override_for(&self, path: Option<&str>) -> Option<RenderStatus> {
        path.and_then(|path| self.render_status_overrides.get(path).copied())
    }

    fn is_large(&self, diff: &RawDiff) -> bool {
        diff.line_count() > self.large_diff_threshold
    }
}

/// Build the patch for a single file from zero, one, or two diffs.
///
/// Two diffs must be the halves of a symlink typechange: a mode change carrying the link
/// target and the content change of the regular file.
///
/// # Errors
///
/// [`BuildError::UnexpectedDiffCount`] for more than two diffs, plus every error of
/// [`build_multi_file_patch`].
pub fn build_file_patch(diffs: &[RawDiff], options: &BuildOptions) -> Result<MultiFilePatch, PatchError> {
    let mut buffer = PatchBuffer::new();
    let file_patch = match diffs {
        [] => FilePatch::null(),
        [diff] => single_diff_file_patch(diff, &mut buffer, options)?,
        [first, second] => dual_diff_file_patch(first, second, &mut buffer, options)?,
        _ => return Err(BuildError::UnexpectedDiffCount { count: diffs.len() }.into()),
    };
    buffer.delete_last_newline();
    Ok(MultiFilePatch::new(buffer, vec![file_patch]))
}

/// Build every file patch of a diff onto one shared buffer, keeping input order.
///
/// Added and deleted diffs sharing a path are paired into a single typechange patch,
/// wherever they appear in `diffs`. The pair takes the position of its first half.
///
/// # Errors
///
/// Returns [`BuildError::UnknownOrigin`] for hunk lines that do not start with one of
/// ` +-\`, [`BuildError::InvalidModeChangeStatus`] for a mispaired typechange and
/// [`BuildError::MissingSymlinkTarget`] for a symlink diff without content.
pub fn build_multi_file_patch(diffs: &[RawDiff], options: &BuildOptions) -> Result<MultiFilePatch, PatchError> {
    let mut buffer = PatchBuffer::new();

    let mut file_patches = Vec::with_capacity(diffs.len());
    for slot in pair_diffs(diffs) {
        let file_patch = match slot {
            Slot::Single(diff) => single_diff_file_patch(diff, &mut buffer, options)?,
            Slot::Dual(first, second) => dual_diff_file_patch(first, second, &mut buffer, options)?,
        };
        file_patches.push(file_patch);
    }

    buffer.delete_last_newline();

    for path in &options.removed {
        let file = File::from_parts(Some(path.clone()), None, None);
        let marker = buffer.mark_position(LayerName::Patch, buffer.end_position(), MarkerOptions::INCLUSIVE);
        let path = path.clone();
        let patch = Patch::hidden(Status::Modified, marker, RenderStatus::Removed, move || {
            Err(PatchError::ExpandRemoved { path })
        });
        file_patches.push(FilePatch::new(file.clone(), file, patch));
    }

    log::debug!("built {} file patches over {} rows", file_patches.len(), buffer.last_row() + 1);
    Ok(MultiFilePatch::new(buffer, file_patches))
}

#[derive(Debug, Clone, Copy)]
enum Slot<'a> {
    Single(&'a RawDiff),
    Dual(&'a RawDiff, &'a RawDiff),
}

fn pair_diffs(diffs: &[RawDiff]) -> Vec<Slot<'_>> {
    let mut slots = Vec::with_capacity(diffs.len());
    let mut waiting: HashMap<&str, usize> = HashMap::new();

    for diff in diffs {
        if !matches!(diff.status, Status::Added | Status::Deleted) {
            slots.push(Slot::Single(diff));
            continue;
        }

        let path = diff.old_path.as_deref().or(diff.new_path.as_deref()).unwrap_or_default();
        match waiting.remove(path) {
            Some(index) => {
                if let Slot::Single(first) = slots[index] {
                    slots[index] = Slot::Dual(first, diff);
                }
            }
            None => {
                waiting.insert(path, slots.len());
                slots.push(Slot::Single(diff));
            }
        }
    }

    slots
}

fn single_diff_file_patch(diff: &RawDiff, buffer: &mut PatchBuffer, options: &BuildOptions) -> Result<FilePatch, PatchError> {
    let was_symlink = diff.old_mode == Some(FileMode::Symlink);
    let is_symlink = diff.new_mode == Some(FileMode::Symlink);

    let (old_symlink, new_symlink) = match (was_symlink, is_symlink) {
        (true, false) => (Some(symlink_target(diff, 0)?), None),
        (false, true) => (None, Some(symlink_target(diff, 0)?)),
        (true, true) => (Some(symlink_target(diff, 0)?), Some(symlink_target(diff, 2)?)),
        (false, false) => (None, None),
    };

    let old_file = File::from_parts(diff.old_path.clone(), diff.old_mode, old_symlink);
    let new_file = File::from_parts(diff.new_path.clone(), diff.new_mode, new_symlink);

    let overridden = if old_file.is_present() {
        options.override_for(old_file.path())
    } else {
        None
    };
    let overridden = overridden.or_else(|| {
        if new_file.is_present() {
            options.override_for(new_file.path())
        } else {
            None
        }
    });
    let render_status = render_status_for(overridden, diff, options);

    let raw = options.preserve_original.then(|| RawPatches {
        content: diff.clone(),
        mode: None,
    });
    let patch = patch_for(diff, diff.status, render_status, buffer)?;
    Ok(with_raw(FilePatch::new(old_file, new_file, patch), raw))
}

fn dual_diff_file_patch(
    first: &RawDiff,
    second: &RawDiff,
    buffer: &mut PatchBuffer,
    options: &BuildOptions,
) -> Result<FilePatch, PatchError> {
    let (mode_diff, content_diff) = if first.has_symlink_mode() {
        (first, second)
    } else {
        (second, first)
    };

    let path = content_diff
        .old_path
        .clone()
        .or_else(|| content_diff.new_path.clone())
        .unwrap_or_default();
    let target = symlink_target(mode_diff, 0)?;

    let (status, old_file, new_file) = match mode_diff.status {
        // The regular file was deleted and a symlink put in its place.
        Status::Added => (
            Status::Deleted,
            File::from_parts(Some(path.clone()), content_diff.old_mode, None),
            File::from_parts(Some(path.clone()), mode_diff.new_mode, Some(target)),
        ),
        // The symlink was deleted and a regular file put in its place.
        Status::Deleted => (
            Status::Added,
            File::from_parts(Some(path.clone()), mode_diff.old_mode, Some(target)),
            File::from_parts(Some(path.clone()), content_diff.new_mode, None),
        ),
        status => return Err(BuildError::InvalidModeChangeStatus { status }.into()),
    };

    let render_status = render_status_for(options.override_for(Some(&path)), content_diff, options);
    let raw = options.preserve_original.then(|| RawPatches {
        content: content_diff.clone(),
        mode: Some(mode_diff.clone()),
    });
    let patch = patch_for(content_diff, status, render_status, buffer)?;
    Ok(with_raw(FilePatch::new(old_file, new_file, patch), raw))
}

fn with_raw(file_patch: FilePatch, raw: Option<RawPatches>) -> FilePatch {
    match raw {
        Some(raw) => file_patch.with_raw_patches(raw),
        None => file_patch,
    }
}

fn render_status_for(overridden: Option<RenderStatus>, diff: &RawDiff, options: &BuildOptions) -> RenderStatus {
    match overridden {
        Some(status) => status,
        None if options.is_large(diff) => RenderStatus::Deferred,
        None => RenderStatus::Expanded,
    }
}

/// The link target is the body of the `line`th line of the first hunk.
fn symlink_target(diff: &RawDiff, line: usize) -> Result<String, BuildError> {
    diff.hunks
        .first()
        .and_then(|hunk| hunk.lines.get(line))
        .map(|line| split_origin(line).1.to_string())
        .ok_or_else(|| BuildError::MissingSymlinkTarget {
            path: diff.path().unwrap_or_default().to_string(),
        })
}

fn split_origin(line: &str) -> (Option<char>, &str) {
    let mut chars = line.chars();
    let origin = chars.next();
    (origin, chars.as_str())
}

/// Render `diff` into `buffer`, or park it behind a hidden patch when `render_status` is
/// not visible.
fn patch_for(
    diff: &RawDiff,
    status: Status,
    render_status: RenderStatus,
    buffer: &mut PatchBuffer,
) -> Result<Patch, BuildError> {
    if render_status.is_visible() {
        let (hunks, marker) = build_hunks(diff, buffer)?;
        return Ok(Patch::concrete(status, hunks, marker, buffer));
    }

    // Fail on malformed content now rather than on first expansion.
    for hunk in &diff.hunks {
        group_regions(hunk)?;
    }

    let marker = buffer.mark_position(LayerName::Patch, buffer.end_position(), MarkerOptions::INCLUSIVE);
    let diff = diff.clone();
    Ok(Patch::hidden(status, marker, render_status, move || {
        log::debug!("materializing {} hunks of {}", diff.hunks.len(), diff.path().unwrap_or_default());
        let mut sub_buffer = PatchBuffer::new();
        let (hunks, marker) = build_hunks(&diff, &mut sub_buffer)?;
        let patch = Patch::concrete(status, hunks, marker, &sub_buffer);
        sub_buffer.delete_last_newline();
        Ok((patch, sub_buffer))
    }))
}

/// Split a hunk's lines into runs of one region kind, origin characters stripped.
fn group_regions(hunk: &RawHunk) -> Result<Vec<(RegionKind, String)>, BuildError> {
    let mut regions: Vec<(RegionKind, String)> = Vec::new();
    for line in &hunk.lines {
        let (origin, text) = split_origin(line);
        let origin = origin.unwrap_or(' ');
        let kind = RegionKind::from_origin(origin).ok_or(BuildError::UnknownOrigin { origin })?;
        match regions.last_mut() {
            Some((last_kind, last_text)) if *last_kind == kind => {
                last_text.push('\n');
                last_text.push_str(text);
            }
            _ => regions.push((kind, text.to_string())),
        }
    }
    Ok(regions)
}

/// Append `diff`'s hunks at the end of `buffer`, followed by a separating line break.
fn build_hunks(diff: &RawDiff, buffer: &mut PatchBuffer) -> Result<(Vec<Hunk>, MarkerId), BuildError> {
    let grouped = diff
        .hunks
        .iter()
        .map(|hunk| group_regions(hunk).map(|regions| (hunk, regions)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut inserter = buffer.create_inserter_at_end();
    inserter.keep_all_before();

    let (blueprints, patch_blueprint) = inserter.mark_while(LayerName::Patch, MarkerOptions::INCLUSIVE, |inserter| {
        let mut blueprints: Vec<(&RawHunk, BlueprintId, Vec<(RegionKind, BlueprintId)>)> = Vec::new();
        for (index, (hunk, regions)) in grouped.iter().enumerate() {
            inserter.insert_if(index > 0, "\n");
            let (regions, hunk_blueprint) = inserter.mark_while(LayerName::Hunk, MarkerOptions::INCLUSIVE, |inserter| {
                regions
                    .iter()
                    .enumerate()
                    .map(|(index, (kind, text))| {
                        inserter.insert_if(index > 0, "\n");
                        (*kind, inserter.insert_marked(text, kind.layer(), MarkerOptions::INCLUSIVE))
                    })
                    .collect::<Vec<_>>()
            });
            blueprints.push((*hunk, hunk_blueprint, regions));
        }
        blueprints
    });
    inserter.insert_if(!diff.hunks.is_empty(), "\n");
    let applied = inserter.apply();

    let hunks = blueprints
        .into_iter()
        .map(|(hunk, hunk_blueprint, regions)| {
            let header = HunkHeader {
                old_start_row: hunk.old_start_line,
                old_row_count: hunk.old_line_count,
                new_start_row: hunk.new_start_line,
                new_row_count: hunk.new_line_count,
            };
            let regions = regions
                .into_iter()
                .map(|(kind, blueprint)| Region::new(kind, applied[blueprint]))
                .collect();
            Hunk::new(header, hunk.heading.clone(), applied[hunk_blueprint], regions)
        })
        .collect();

    Ok((hunks, applied[patch_blueprint]))
}
