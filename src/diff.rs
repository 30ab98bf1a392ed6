//! Raw per-file diff records, as produced by `git diff` and consumed by the
//! [builder](crate::builder).

use crate::model::{FileMode, Status};

/// One `@@` block of a raw diff. Every line keeps its origin character.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawHunk {
    pub old_start_line: usize,
    pub old_line_count: usize,
    pub new_start_line: usize,
    pub new_line_count: usize,
    pub heading: String,
    pub lines: Vec<String>,
}

/// Everything the diff says about a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDiff {
    pub old_path: Option<String>,
    pub old_mode: Option<FileMode>,
    pub new_path: Option<String>,
    pub new_mode: Option<FileMode>,
    pub status: Status,
    pub hunks: Vec<RawHunk>,
}

impl RawDiff {
    /// A diff with no sides and no hunks; fill in with struct update syntax.
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            old_path: None,
            old_mode: None,
            new_path: None,
            new_mode: None,
            status,
            hunks: Vec::new(),
        }
    }

    /// The path identifying this diff: the new path, falling back to the old one.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }

    /// Total number of hunk body lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.hunks.iter().map(|hunk| hunk.lines.len()).sum()
    }

    /// Whether either side is a symlink.
    #[must_use]
    pub fn has_symlink_mode(&self) -> bool {
        self.old_mode == Some(FileMode::Symlink) || self.new_mode == Some(FileMode::Symlink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_prefers_new_side() {
        let diff = RawDiff {
            old_path: Some("old.txt".into()),
            new_path: Some("new.txt".into()),
            ..RawDiff::new(Status::Renamed)
        };
        assert_eq!(diff.path(), Some("new.txt"));

        let deleted = RawDiff {
            old_path: Some("gone.txt".into()),
            ..RawDiff::new(Status::Deleted)
        };
        assert_eq!(deleted.path(), Some("gone.txt"));
    }

    #[test]
    fn counts_lines_across_hunks() {
        let diff = RawDiff {
            hunks: vec![
                RawHunk {
                    lines: vec![" a".into(), "+b".into()],
                    ..RawHunk::default()
                },
                RawHunk {
                    lines: vec!["-c".into()],
                    ..RawHunk::default()
                },
            ],
            ..RawDiff::new(Status::Modified)
        };
        assert_eq!(diff.line_count(), 3);
        assert!(!diff.has_symlink_mode());
    }
}
