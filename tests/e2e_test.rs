use git2::{Repository, Signature};
use patch_model::{BuildOptions, MultiFilePatch, load, parse_row_selection};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Test fixture for a git repository
struct Fixture {
    dir: TempDir,
    repo: Repository,
}

impl Fixture {
    /// Create a new empty repo with deterministic config
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Repository::init(dir.path()).expect("Failed to init repo");

        // Deterministic config
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();

        Self { dir, repo }
    }

    fn path(&self) -> &str {
        self.dir.path().to_str().unwrap()
    }

    fn write_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn remove_file(&self, name: &str) {
        fs::remove_file(self.dir.path().join(name)).unwrap();
    }

    fn stage_file(&self, name: &str) {
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    fn commit(&self, message: &str) {
        let sig = Signature::new("Test User", "test@example.com", &git2::Time::new(1234567890, 0)).unwrap();
        let tree_id = self.repo.index().unwrap().write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        if self.repo.head().is_ok() {
            let parent = self.repo.head().unwrap().peel_to_commit().unwrap();
            self.repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
                .unwrap();
        } else {
            self.repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[]).unwrap();
        }
    }

    /// Commit `content` as `name`, then overwrite it in the working tree with `modified`
    fn commit_then_modify(&self, name: &str, content: &str, modified: &str) {
        self.write_file(name, content);
        self.stage_file(name);
        self.commit("initial");
        self.write_file(name, modified);
    }

    fn git_diff(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(["-C", self.path(), "diff", "--no-ext-diff", "--no-color"])
            .args(args)
            .output()
            .expect("Failed to run git diff");
        assert!(output.status.success(), "git diff failed");
        String::from_utf8(output.stdout).unwrap()
    }

    /// Unstaged changes as a model
    fn unstaged(&self) -> MultiFilePatch {
        load(&self.git_diff(&[]), &BuildOptions::default()).unwrap()
    }

    /// Staged changes as a model
    fn staged(&self) -> MultiFilePatch {
        load(&self.git_diff(&["--cached"]), &BuildOptions::default()).unwrap()
    }

    /// Apply `patch` to the index only
    fn apply_cached(&self, patch: &str) {
        let mut child = Command::new("git")
            .args(["-C", self.path(), "apply", "--cached", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn git apply");
        child.stdin.take().unwrap().write_all(patch.as_bytes()).unwrap();
        let output = child.wait_with_output().unwrap();
        assert!(
            output.status.success(),
            "git apply failed: {}\n{patch}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// Content of `name` in the index, if it is tracked there
    fn index_content(&self, name: &str) -> Option<String> {
        let mut index = self.repo.index().unwrap();
        index.read(true).unwrap();
        let entry = index.get_path(Path::new(name), 0)?;
        let blob = self.repo.find_blob(entry.id).unwrap();
        Some(String::from_utf8(blob.content().to_vec()).unwrap())
    }
}

// =============================================================================
// Staging
// =============================================================================

#[test]
fn stage_single_addition() {
    let fixture = Fixture::new();
    let initial: String = (1..=10).map(|i| format!("line {i}\n")).collect();
    fixture.commit_then_modify("flake.nix", &initial, &format!("{initial}      debug = true;\n"));

    let mfp = fixture.unstaged();
    insta::assert_snapshot!(patch_model::format_rows(&mfp), @r"
    0  line 8  flake.nix
    1  line 9  flake.nix
    2  line 10  flake.nix
    3 +      debug = true;  flake.nix
    ");

    fixture.apply_cached(&mfp.get_stage_patch_for_lines(&parse_row_selection("3").unwrap()).to_string());

    assert_eq!(
        fixture.index_content("flake.nix").unwrap(),
        format!("{initial}      debug = true;\n")
    );
    assert!(fixture.git_diff(&[]).is_empty());
}

#[test]
fn stage_one_addition_out_of_a_modification() {
    let fixture = Fixture::new();
    fixture.commit_then_modify("gtk.nix", "a\nb\nc\n", "a\nB\nc\nd\n");

    // 0 " a", 1 "-b", 2 "+B", 3 " c", 4 "+d"
    let mfp = fixture.unstaged();
    fixture.apply_cached(&mfp.get_stage_patch_for_lines(&parse_row_selection("4").unwrap()).to_string());

    assert_eq!(fixture.index_content("gtk.nix").unwrap(), "a\nb\nc\nd\n");
}

#[test]
fn stage_replacement_but_not_trailing_addition() {
    let fixture = Fixture::new();
    fixture.commit_then_modify("gtk.nix", "a\nb\nc\n", "a\nB\nc\nd\n");

    let mfp = fixture.unstaged();
    fixture.apply_cached(&mfp.get_stage_patch_for_lines(&parse_row_selection("1..2").unwrap()).to_string());

    assert_eq!(fixture.index_content("gtk.nix").unwrap(), "a\nB\nc\n");
    assert_eq!(fixture.unstaged().buffer().text(), "a\nB\nc\nd");
}

#[test]
fn stage_across_two_files() {
    let fixture = Fixture::new();
    fixture.write_file("one.txt", "1\n2\n");
    fixture.write_file("two.txt", "x\ny\n");
    fixture.stage_file("one.txt");
    fixture.stage_file("two.txt");
    fixture.commit("initial");
    fixture.write_file("one.txt", "1\n2\n3\n");
    fixture.write_file("two.txt", "x\n");

    // one.txt: 0 " 1", 1 " 2", 2 "+3"; two.txt: 3 " x", 4 "-y"
    let mfp = fixture.unstaged();
    let rows = parse_row_selection("2,4").unwrap();
    assert!(mfp.spans_multiple_files(rows.iter().copied()));
    fixture.apply_cached(&mfp.get_stage_patch_for_lines(&rows).to_string());

    assert_eq!(fixture.index_content("one.txt").unwrap(), "1\n2\n3\n");
    assert_eq!(fixture.index_content("two.txt").unwrap(), "x\n");
}

#[test]
fn stage_whole_deleted_file() {
    let fixture = Fixture::new();
    fixture.write_file("zsh.nix", "first\nsecond\n");
    fixture.stage_file("zsh.nix");
    fixture.commit("initial");
    fixture.remove_file("zsh.nix");

    let mfp = fixture.unstaged();
    assert_eq!(mfp.file_patches()[0].status(), Some(patch_model::Status::Deleted));
    fixture.apply_cached(&mfp.get_stage_patch_for_lines(&parse_row_selection("0..1").unwrap()).to_string());

    assert_eq!(fixture.index_content("zsh.nix"), None);
}

// =============================================================================
// Unstaging
// =============================================================================

#[test]
fn unstage_one_addition() {
    let fixture = Fixture::new();
    fixture.commit_then_modify("gtk.nix", "a\nb\nc\n", "a\nB\nc\nd\n");
    fixture.stage_file("gtk.nix");

    let mfp = fixture.staged();
    fixture.apply_cached(&mfp.get_unstage_patch_for_lines(&parse_row_selection("4").unwrap()).to_string());

    assert_eq!(fixture.index_content("gtk.nix").unwrap(), "a\nB\nc\n");
    assert_eq!(fixture.unstaged().buffer().text(), "a\nB\nc\nd");
}

#[test]
fn unstage_whole_hunk() {
    let fixture = Fixture::new();
    fixture.commit_then_modify("gtk.nix", "a\nb\nc\n", "a\nB\nc\n");
    fixture.stage_file("gtk.nix");

    let mfp = fixture.staged();
    let hunk = &mfp.file_patches()[0].hunks()[0];
    fixture.apply_cached(&mfp.get_unstage_patch_for_hunk(hunk).to_string());

    assert_eq!(fixture.index_content("gtk.nix").unwrap(), "a\nb\nc\n");
    assert!(fixture.git_diff(&["--cached"]).is_empty());
}
