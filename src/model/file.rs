use std::fmt;

/// Git file modes that can appear in a diff header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    Normal,
    Executable,
    Symlink,
    Gitlink,
}

impl FileMode {
    /// Parse the octal form used in diff headers, e.g. `100644`.
    #[must_use]
    pub fn from_octal(text: &str) -> Option<Self> {
        match text {
            "100644" => Some(FileMode::Normal),
            "100755" => Some(FileMode::Executable),
            "120000" => Some(FileMode::Symlink),
            "160000" => Some(FileMode::Gitlink),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_octal(self) -> &'static str {
        match self {
            FileMode::Normal => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Gitlink => "160000",
        }
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_octal())
    }
}

/// One side of a file diff. The null file (no path, no mode) stands for an absent side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    path: Option<String>,
    mode: Option<FileMode>,
    symlink: Option<String>,
}

impl File {
    #[must_use]
    pub fn new(path: impl Into<String>, mode: FileMode) -> Self {
        Self {
            path: Some(path.into()),
            mode: Some(mode),
            symlink: None,
        }
    }

    /// The absent side of an added or deleted file.
    #[must_use]
    pub fn null() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_symlink(mut self, target: impl Into<String>) -> Self {
        self.symlink = Some(target.into());
        self
    }

    /// A file exists when either its path or its mode is known.
    #[must_use]
    pub(crate) fn from_parts(path: Option<String>, mode: Option<FileMode>, symlink: Option<String>) -> Self {
        if path.is_none() && mode.is_none() {
            return Self::null();
        }
        Self { path, mode, symlink }
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn mode(&self) -> Option<FileMode> {
        self.mode
    }

    #[must_use]
    pub fn symlink(&self) -> Option<&str> {
        self.symlink.as_deref()
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.path.is_some() || self.mode.is_some()
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.mode == Some(FileMode::Symlink)
    }

    #[must_use]
    pub fn is_regular_file(&self) -> bool {
        matches!(self.mode, Some(FileMode::Normal | FileMode::Executable))
    }

    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.mode == Some(FileMode::Executable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_octal_modes() {
        for mode in [
            FileMode::Normal,
            FileMode::Executable,
            FileMode::Symlink,
            FileMode::Gitlink,
        ] {
            assert_eq!(FileMode::from_octal(mode.as_octal()), Some(mode));
        }
        assert_eq!(FileMode::from_octal("040000"), None);
    }

    #[test]
    fn null_file_is_absent() {
        let file = File::null();
        assert!(!file.is_present());
        assert_eq!(file.path(), None);
        assert_eq!(file.mode(), None);
        assert!(!file.is_symlink());
        assert!(!file.is_regular_file());
    }

    #[test]
    fn mode_predicates() {
        let executable = File::new("run.sh", FileMode::Executable);
        assert!(executable.is_present());
        assert!(executable.is_executable());
        assert!(executable.is_regular_file());

        let link = File::new("link", FileMode::Symlink).with_symlink("target.txt");
        assert!(link.is_symlink());
        assert!(!link.is_regular_file());
        assert_eq!(link.symlink(), Some("target.txt"));
    }

    #[test]
    fn from_parts_requires_path_or_mode() {
        assert!(!File::from_parts(None, None, Some("ignored".into())).is_present());
        assert!(File::from_parts(None, Some(FileMode::Normal), None).is_present());
    }
}
