//! The patch object graph rendered onto one shared [`PatchBuffer`](crate::buffer::PatchBuffer).
//!
//! A [`MultiFilePatch`] owns the buffer and an ordered list of [`FilePatch`]es. Each
//! file patch pairs an old and new [`File`] with a [`Patch`], whose [`Hunk`]s are made of
//! [`Region`]s. None of these own text: every one of them holds a marker into the shared
//! buffer and reads its rows from there.

mod file;
mod file_patch;
mod hunk;
mod multi_file_patch;
mod patch;
mod region;

use std::fmt;

use error_set::error_set;

pub use file::{File, FileMode};
pub use file_patch::{FilePatch, RawPatches, RenderStatusChange, SubscriptionId};
pub use hunk::{Hunk, HunkHeader};
pub use multi_file_patch::MultiFilePatch;
pub use patch::{ConcretePatch, HiddenPatch, Materialize, Patch};
pub use region::{Region, RegionKind, RowIntersection};

error_set! {
    /// Errors raised while assembling patches from raw diffs
    BuildError := {
        #[display("Unknown diff status character: \"{origin}\"")]
        UnknownOrigin { origin: char },
        #[display("Unexpected number of diffs: {count}")]
        UnexpectedDiffCount { count: usize },
        #[display("Invalid mode diff status: {status}")]
        InvalidModeChangeStatus { status: Status },
        #[display("Symlink diff for {path} does not carry a target line")]
        MissingSymlinkTarget { path: String },
    }

    /// Errors raised by operations on built patches
    PatchError := {
        #[display("Attempt to expand removed file patch {path}")]
        ExpandRemoved { path: String },
        #[display("FilePatch for {path} was not built with preserve_original")]
        MissingRawPatch { path: String },
    } || BuildError
}

/// How a file changed between the two sides of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Added,
    Deleted,
    Modified,
    Renamed,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Added => "added",
            Status::Deleted => "deleted",
            Status::Modified => "modified",
            Status::Renamed => "renamed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility of a file patch's content in the shared buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RenderStatus {
    /// Hunks are rendered into the buffer.
    #[default]
    Expanded,
    /// Hidden by the user; the content is parked in a private buffer.
    Collapsed,
    /// Too large to render eagerly; hunks are built on first expansion.
    Deferred,
    /// The file is gone. Never expandable.
    Removed,
}

impl RenderStatus {
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, RenderStatus::Expanded)
    }

    #[must_use]
    pub const fn is_expandable(self) -> bool {
        matches!(self, RenderStatus::Collapsed | RenderStatus::Deferred)
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderStatus::Expanded => "expanded",
            RenderStatus::Collapsed => "collapsed",
            RenderStatus::Deferred => "deferred",
            RenderStatus::Removed => "removed",
        };
        write!(f, "RenderStatus({name})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_status_predicates() {
        assert!(RenderStatus::Expanded.is_visible());
        assert!(!RenderStatus::Expanded.is_expandable());

        for hidden in [RenderStatus::Collapsed, RenderStatus::Deferred] {
            assert!(!hidden.is_visible());
            assert!(hidden.is_expandable());
        }

        assert!(!RenderStatus::Removed.is_visible());
        assert!(!RenderStatus::Removed.is_expandable());
    }

    #[test]
    fn errors_display_their_context() {
        let error = BuildError::UnexpectedDiffCount { count: 3 };
        assert_eq!(error.to_string(), "Unexpected number of diffs: 3");

        let error: PatchError = BuildError::UnknownOrigin { origin: '%' }.into();
        assert_eq!(error.to_string(), "Unknown diff status character: \"%\"");

        let error = BuildError::InvalidModeChangeStatus {
            status: Status::Modified,
        };
        assert_eq!(error.to_string(), "Invalid mode diff status: modified");
    }
}
