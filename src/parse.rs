//! Parsing `git diff` output and row selections.
//!
//! [`parse_diffs`] turns unified diff text into the [`RawDiff`] records the
//! [builder](crate::builder) consumes. [`parse_row_selection`] reads the buffer-row
//! syntax used to pick lines for staging.
//!
//! # Diff syntax
//!
//! Each file starts with a `diff --git a/OLD b/NEW` line, followed by optional extended
//! header lines (`old mode`, `new mode`, `new file mode`, `deleted file mode`, `index`,
//! `rename from`, `rename to`, ...), the `---`/`+++` path lines and any number of hunks.
//! Hunk bodies are read by the line counts in their `@@` header; omitted counts are 1.
//!
//! # Selection syntax
//!
//! A comma-separated list of buffer rows (`N`) and inclusive row ranges (`N..M`).
//!
//! # Examples
//!
//! ```
//! use patch_model::model::Status;
//! use patch_model::parse::{parse_diffs, parse_row_selection};
//!
//! let diffs = parse_diffs(
//!     "diff --git a/new.txt b/new.txt\n\
//!      new file mode 100644\n\
//!      --- /dev/null\n\
//!      +++ b/new.txt\n\
//!      @@ -0,0 +1 @@\n\
//!      +hello\n",
//! )
//! .unwrap();
//! assert_eq!(diffs[0].status, Status::Added);
//! assert_eq!(diffs[0].hunks[0].lines, vec!["+hello".to_string()]);
//!
//! let rows = parse_row_selection("0,3..5").unwrap();
//! assert_eq!(rows.into_iter().collect::<Vec<_>>(), vec![0, 3, 4, 5]);
//! ```

use std::collections::BTreeSet;
use std::iter::Peekable;

use error_set::error_set;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till};
use nom::character::complete::{char, digit1};
use nom::combinator::{map_opt, map_res, opt, rest};
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::diff::{RawDiff, RawHunk};
use crate::model::{FileMode, Status};

error_set! {
    /// Errors from parsing unified diff text
    ParseError := {
        /// A hunk appeared before any `diff --git` line
        #[display("Line {line}: hunk outside of a file diff")]
        HunkOutsideDiff { line: usize },
        /// The `@@` line could not be read
        #[display("Line {line}: invalid hunk header '{header}'")]
        InvalidHunkHeader { line: usize, header: String },
        /// The hunk body ended before its header counts were used up
        #[display("Line {line}: hunk '{header}' is shorter than its header says")]
        TruncatedHunk { line: usize, header: String },
    }

    /// Errors from parsing row selections
    SelectionError := {
        /// No rows given
        #[display("No rows selected")]
        EmptySelection,
        /// Row could not be parsed as a number
        #[display("Invalid row '{value}'")]
        InvalidRow { value: String },
        /// Range has start greater than end
        #[display("Invalid range {start}..{end}: start must be <= end")]
        InvalidRange { start: usize, end: usize },
    }
}

// =============================================================================
// Diff text
// =============================================================================

/// Parse `git diff` output into one [`RawDiff`] per `diff --git` block.
///
/// # Errors
///
/// Returns [`ParseError`] if:
/// - A hunk header appears before the first file header
/// - A hunk header is malformed
/// - A hunk body holds fewer lines than its header counts
pub fn parse_diffs(text: &str) -> Result<Vec<RawDiff>, ParseError> {
    let mut diffs = Vec::new();
    let mut pending: Option<PendingDiff> = None;
    // Carriage returns are content; only header lines drop them.
    let mut lines = text.split_terminator('\n').enumerate().peekable();

    while let Some((index, raw_line)) = lines.next() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.starts_with("@@") {
            let Some(diff) = pending.as_mut() else {
                return Err(ParseError::HunkOutsideDiff { line: index + 1 });
            };
            let hunk = parse_hunk(index, line, &mut lines)?;
            diff.hunks.push(hunk);
            continue;
        }

        let Ok((_, header)) = header_line(line) else {
            continue;
        };
        if let HeaderLine::DiffGit(paths) = header {
            diffs.extend(pending.take().map(PendingDiff::finish));
            pending = Some(PendingDiff::from_git_paths(paths));
        } else if let Some(diff) = pending.as_mut() {
            diff.apply(header);
        }
    }

    diffs.extend(pending.map(PendingDiff::finish));
    Ok(diffs)
}

/// Read one hunk: its header plus exactly as many body lines as the header counts, and
/// any trailing `\ No newline at end of file` markers.
fn parse_hunk<'a, I>(index: usize, header: &str, lines: &mut Peekable<I>) -> Result<RawHunk, ParseError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let (_, mut hunk) = hunk_header(header).map_err(|_| ParseError::InvalidHunkHeader {
        line: index + 1,
        header: header.to_string(),
    })?;

    let mut old_left = hunk.old_line_count;
    let mut new_left = hunk.new_line_count;

    loop {
        let Some(&(_, line)) = lines.peek() else {
            break;
        };
        let counted = old_left > 0 || new_left > 0;
        match line.chars().next() {
            Some('\\') => {}
            Some(' ') if counted => {
                old_left = old_left.saturating_sub(1);
                new_left = new_left.saturating_sub(1);
            }
            Some('-') if old_left > 0 => old_left -= 1,
            Some('+') if new_left > 0 => new_left -= 1,
            _ => break,
        }
        hunk.lines.push(line.to_string());
        lines.next();
    }

    if old_left > 0 || new_left > 0 {
        return Err(ParseError::TruncatedHunk {
            line: index + 1,
            header: header.to_string(),
        });
    }
    Ok(hunk)
}

fn number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |digits: &str| digits.parse::<usize>()).parse(input)
}

/// `start[,count]`, with a missing count meaning one line.
fn line_range(input: &str) -> IResult<&str, (usize, usize)> {
    (number, opt(preceded(char(','), number)))
        .map(|(start, count)| (start, count.unwrap_or(1)))
        .parse(input)
}

fn hunk_header(input: &str) -> IResult<&str, RawHunk> {
    (tag("@@ -"), line_range, tag(" +"), line_range, tag(" @@"), rest)
        .map(|(_, (old_start_line, old_line_count), _, (new_start_line, new_line_count), _, heading)| RawHunk {
            old_start_line,
            old_line_count,
            new_start_line,
            new_line_count,
            heading: heading.trim_start().to_string(),
            lines: Vec::new(),
        })
        .parse(input)
}

fn file_mode(input: &str) -> IResult<&str, FileMode> {
    map_opt(digit1, FileMode::from_octal).parse(input)
}

fn old_side_path(input: &str) -> IResult<&str, Option<&str>> {
    side_path(input, "a/")
}

fn new_side_path(input: &str) -> IResult<&str, Option<&str>> {
    side_path(input, "b/")
}

/// The path after `---` or `+++`; `None` for `/dev/null`.
fn side_path<'a>(input: &'a str, prefix: &'static str) -> IResult<&'a str, Option<&'a str>> {
    alt((
        tag("/dev/null").map(|_| None),
        preceded(tag(prefix), rest).map(Some),
        rest.map(Some),
    ))
    .parse(input)
}

/// Extended header lines of one file diff. Lines not listed here are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderLine<'a> {
    DiffGit(&'a str),
    OldMode(FileMode),
    NewMode(FileMode),
    NewFile(FileMode),
    DeletedFile(FileMode),
    Index(Option<FileMode>),
    RenameFrom(&'a str),
    RenameTo(&'a str),
    OldPath(Option<&'a str>),
    NewPath(Option<&'a str>),
}

fn header_line(input: &str) -> IResult<&str, HeaderLine<'_>> {
    alt((
        preceded(tag("diff --git "), rest).map(HeaderLine::DiffGit),
        preceded(tag("old mode "), file_mode).map(HeaderLine::OldMode),
        preceded(tag("new mode "), file_mode).map(HeaderLine::NewMode),
        preceded(tag("new file mode "), file_mode).map(HeaderLine::NewFile),
        preceded(tag("deleted file mode "), file_mode).map(HeaderLine::DeletedFile),
        preceded(
            (tag("index "), take_till(|c: char| c == ' ')),
            opt(preceded(char(' '), file_mode)),
        )
        .map(HeaderLine::Index),
        preceded(tag("rename from "), rest).map(HeaderLine::RenameFrom),
        preceded(tag("rename to "), rest).map(HeaderLine::RenameTo),
        preceded(tag("--- "), old_side_path).map(HeaderLine::OldPath),
        preceded(tag("+++ "), new_side_path).map(HeaderLine::NewPath),
    ))
    .parse(input)
}

/// Header state collected until the next `diff --git` line.
#[derive(Debug, Default)]
struct PendingDiff {
    git_old_path: Option<String>,
    git_new_path: Option<String>,
    old_path: Option<Option<String>>,
    new_path: Option<Option<String>>,
    rename_from: Option<String>,
    rename_to: Option<String>,
    old_mode: Option<FileMode>,
    new_mode: Option<FileMode>,
    index_mode: Option<FileMode>,
    new_file: bool,
    deleted_file: bool,
    hunks: Vec<RawHunk>,
}

impl PendingDiff {
    /// `a/OLD b/NEW`. Ambiguous when a path contains ` b/`; the `---`/`+++` lines win.
    fn from_git_paths(paths: &str) -> Self {
        let (old, new) = match paths.rfind(" b/") {
            Some(split) => (&paths[..split], &paths[split + 1..]),
            None => (paths, paths),
        };
        Self {
            git_old_path: Some(old.strip_prefix("a/").unwrap_or(old).to_string()),
            git_new_path: Some(new.strip_prefix("b/").unwrap_or(new).to_string()),
            ..Self::default()
        }
    }

    fn apply(&mut self, header: HeaderLine<'_>) {
        match header {
            HeaderLine::DiffGit(_) => {}
            HeaderLine::OldMode(mode) => self.old_mode = Some(mode),
            HeaderLine::NewMode(mode) => self.new_mode = Some(mode),
            HeaderLine::NewFile(mode) => {
                self.new_file = true;
                self.new_mode = Some(mode);
            }
            HeaderLine::DeletedFile(mode) => {
                self.deleted_file = true;
                self.old_mode = Some(mode);
            }
            HeaderLine::Index(mode) => self.index_mode = mode,
            HeaderLine::RenameFrom(path) => self.rename_from = Some(path.to_string()),
            HeaderLine::RenameTo(path) => self.rename_to = Some(path.to_string()),
            HeaderLine::OldPath(path) => self.old_path = Some(path.map(str::to_string)),
            HeaderLine::NewPath(path) => self.new_path = Some(path.map(str::to_string)),
        }
    }

    fn finish(self) -> RawDiff {
        let added = self.new_file || self.old_path == Some(None);
        let deleted = self.deleted_file || self.new_path == Some(None);
        let renamed = self.rename_from.is_some() || self.rename_to.is_some();

        let status = if added {
            Status::Added
        } else if deleted {
            Status::Deleted
        } else if renamed {
            Status::Renamed
        } else {
            Status::Modified
        };

        let (old_path, old_mode) = if added {
            (None, None)
        } else {
            (
                self.old_path.flatten().or(self.rename_from).or(self.git_old_path),
                self.old_mode.or(self.index_mode),
            )
        };
        let (new_path, new_mode) = if deleted {
            (None, None)
        } else {
            (
                self.new_path.flatten().or(self.rename_to).or(self.git_new_path),
                self.new_mode.or(self.index_mode),
            )
        };

        RawDiff {
            old_path,
            old_mode,
            new_path,
            new_mode,
            status,
            hunks: self.hunks,
        }
    }
}

// =============================================================================
// Row selections
// =============================================================================

/// Parse a row selection such as `0,3..5,9` into sorted buffer rows.
///
/// # Errors
///
/// Returns [`SelectionError`] if:
/// - No rows are given
/// - A row is not a number
/// - A range ends before it starts
pub fn parse_row_selection(input: &str) -> Result<BTreeSet<usize>, SelectionError> {
    let mut rows = BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.split_once("..") {
            Some((start, end)) => {
                let start = parse_row(start)?;
                let end = parse_row(end)?;
                if start > end {
                    return Err(SelectionError::InvalidRange { start, end });
                }
                rows.extend(start..=end);
            }
            None => {
                rows.insert(parse_row(part)?);
            }
        }
    }

    if rows.is_empty() {
        return Err(SelectionError::EmptySelection);
    }
    Ok(rows)
}

fn parse_row(input: &str) -> Result<usize, SelectionError> {
    input.trim().parse::<usize>().map_err(|_| SelectionError::InvalidRow {
        value: input.to_string(),
    })
}
