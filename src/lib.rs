//! An in-memory, incrementally editable model of a multi-file diff.
//!
//! Diff text is parsed into raw records ([`parse`]), assembled onto one shared annotated
//! buffer ([`builder`]) and exposed as a [`MultiFilePatch`] ([`model`]) that can derive
//! partial stage/unstage patches, collapse and expand file patches in place, and translate
//! positions in the original diff to buffer rows.
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeSet;
//! use patch_model::{BuildOptions, load};
//!
//! let mfp = load(
//!     "diff --git a/a.txt b/a.txt\n\
//!      --- a/a.txt\n\
//!      +++ b/a.txt\n\
//!      @@ -1,2 +1,2 @@\n\
//!      -old\n\
//!      +new\n \
//!      same\n",
//!     &BuildOptions::default(),
//! )
//! .unwrap();
//!
//! let staged = mfp.get_stage_patch_for_lines(&BTreeSet::from([1]));
//! assert_eq!(staged.buffer().text(), "old\nnew\nsame\n");
//! ```

use error_set::error_set;

pub mod buffer;
pub mod builder;
pub mod diff;
pub mod model;
pub mod parse;

pub use buffer::{PatchBuffer, Point, Range};
pub use builder::{BuildOptions, build_file_patch, build_multi_file_patch};
pub use diff::{RawDiff, RawHunk};
pub use model::{BuildError, FilePatch, MultiFilePatch, PatchError, RenderStatus, Status};
pub use parse::{ParseError, SelectionError, parse_diffs, parse_row_selection};

error_set! {
    /// Top-level error for patch-model operations
    PatchModelError := {
        #[display("Failed to read diff from {input}: {message}")]
        ReadFailed { input: String, message: String },
        #[display("No file patch for path {path}")]
        UnknownPath { path: String },
        ParseError(ParseError),
        SelectionError(SelectionError),
        PatchError(PatchError),
    }
}

/// Parse `git diff` output and build it into a [`MultiFilePatch`].
///
/// # Errors
///
/// Returns [`PatchModelError`] if the text is not a valid diff or its records cannot be
/// assembled.
pub fn load(text: &str, options: &BuildOptions) -> Result<MultiFilePatch, PatchModelError> {
    let diffs = parse_diffs(text)?;
    log::debug!("parsed {} file diffs", diffs.len());
    Ok(build_multi_file_patch(&diffs, options)?)
}

/// List every buffer row with its number, origin character and owning file path.
///
/// Rows outside any hunk (hidden patches own none) are skipped.
///
/// # Examples
///
/// ```
/// use patch_model::{BuildOptions, format_rows, load};
///
/// let mfp = load(
///     "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1 +1,2 @@\n one\n+two\n",
///     &BuildOptions::default(),
/// )
/// .unwrap();
///
/// assert_eq!(format_rows(&mfp), "0  one  a.txt\n1 +two  a.txt\n");
/// ```
#[must_use]
pub fn format_rows(mfp: &MultiFilePatch) -> String {
    let buffer = mfp.buffer();
    if buffer.is_empty() {
        return String::new();
    }

    let width = buffer.last_row().to_string().len();
    let mut out = String::new();
    for row in 0..=buffer.last_row() {
        let Some(file_patch) = mfp.get_file_patch_at(row) else {
            continue;
        };
        let Some(region) = mfp
            .get_hunk_at(row)
            .and_then(|hunk| hunk.regions().iter().find(|region| region.includes_buffer_row(buffer, row)))
        else {
            continue;
        };

        out.push_str(&format!(
            "{row:>width$} {}{}  {}\n",
            region.kind().origin(),
            buffer.line(row).unwrap_or_default(),
            file_patch.path().unwrap_or_default(),
        ));
    }
    out
}
