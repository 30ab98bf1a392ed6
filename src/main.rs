use std::io::{self, Write};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use patch_model::builder::DEFAULT_LARGE_DIFF_THRESHOLD;
use patch_model::{
    BuildOptions, MultiFilePatch, PatchModelError, RenderStatus, format_rows, load, parse_row_selection,
};

#[derive(Parser)]
#[command(name = "patch-model", version)]
#[command(about = "Inspect multi-file diffs and derive line-level stage/unstage patches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DiffInput {
    /// Diff to read (output of `git diff`), or `-` for stdin
    diff: String,
    /// Diffs with more body lines than this start out deferred
    #[arg(long, value_name = "LINES", default_value_t = DEFAULT_LARGE_DIFF_THRESHOLD)]
    large_diff_threshold: usize,
    /// Start this path collapsed (repeatable)
    #[arg(long, value_name = "PATH")]
    collapse: Vec<String>,
    /// Start this path deferred (repeatable)
    #[arg(long, value_name = "PATH")]
    defer: Vec<String>,
}

impl DiffInput {
    fn options(&self) -> BuildOptions {
        let options = BuildOptions::default().with_large_diff_threshold(self.large_diff_threshold);
        let options = self
            .collapse
            .iter()
            .fold(options, |options, path| options.with_render_status(path, RenderStatus::Collapsed));
        self.defer
            .iter()
            .fold(options, |options, path| options.with_render_status(path, RenderStatus::Deferred))
    }

    fn load(&self) -> Result<MultiFilePatch, PatchModelError> {
        let text = if self.diff == "-" {
            io::read_to_string(io::stdin())
        } else {
            std::fs::read_to_string(&self.diff)
        }
        .map_err(|e| PatchModelError::ReadFailed {
            input: self.diff.clone(),
            message: e.to_string(),
        })?;
        load(&text, &self.options())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print every buffer row with its origin and file path
    Show {
        #[command(flatten)]
        input: DiffInput,
    },
    /// Print the patch that stages the selected rows (apply with `git apply --cached`)
    Stage {
        #[command(flatten)]
        input: DiffInput,
        /// Buffer rows to stage (e.g. "0,3..5,9")
        #[arg(long)]
        rows: String,
    },
    /// Print the patch that unstages the selected rows (apply with `git apply --cached`)
    Unstage {
        #[command(flatten)]
        input: DiffInput,
        /// Buffer rows to unstage (e.g. "0,3..5,9")
        #[arg(long)]
        rows: String,
    },
    /// Print the rows of a file patch around a position in its original diff
    Preview {
        #[command(flatten)]
        input: DiffInput,
        /// File path as it appears in the diff
        #[arg(long)]
        path: String,
        /// Line number in the file's diff, counted from its first hunk header
        #[arg(long)]
        diff_row: usize,
        /// Rows to show, ending at the requested position
        #[arg(long, default_value_t = 5)]
        max_rows: usize,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Generate a man page
    Man,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Show { input } => {
            write!(stdout, "{}", format_rows(&input.load()?))?;
        }
        Commands::Stage { input, rows } => {
            let rows = parse_row_selection(&rows)?;
            write!(stdout, "{}", input.load()?.get_stage_patch_for_lines(&rows))?;
        }
        Commands::Unstage { input, rows } => {
            let rows = parse_row_selection(&rows)?;
            write!(stdout, "{}", input.load()?.get_unstage_patch_for_lines(&rows))?;
        }
        Commands::Preview {
            input,
            path,
            diff_row,
            max_rows,
        } => {
            let mfp = input.load()?;
            if mfp.patch_for_path(&path).is_none() {
                return Err(PatchModelError::UnknownPath { path }.into());
            }
            let preview = mfp.get_preview_patch_buffer(&path, diff_row, max_rows);
            writeln!(stdout, "{}", preview.text())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "patch-model", &mut stdout);
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command()).render(&mut stdout)?;
        }
    }

    Ok(())
}
