use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "hygiene",
    version,
    about = "Style hygiene audits and diagnostic-driven auto-fixing"
)]
pub struct Args {
    /// Path to configuration file [default: .hygiene.yml if present]
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output (ignored when RUST_LOG is set)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Repair fixable checker diagnostics until the checker converges
    Fix(FixArgs),
    /// Aggregate linter scores per file, path and author
    Score(ScoreArgs),
    /// List TODO/FIXME markers grouped by author
    Todos(WalkArgs),
    /// Fail when the checker's error-to-code-line ratio is too high
    Ratio(RatioArgs),
    /// Check tabs, trailing whitespace, line width and backslashes
    Lines(WalkArgs),
}

/// Which files a command visits.
#[derive(clap::Args, Debug, Clone)]
pub struct WalkArgs {
    /// Files or directories to check
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Regexes of root-relative paths to skip (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Only visit the top level of each directory
    #[arg(long)]
    pub no_recursive: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct FixArgs {
    #[command(flatten)]
    pub walk: WalkArgs,

    /// Checker command; the file path is appended
    #[arg(long, value_name = "CMD")]
    pub checker: Option<String>,

    /// Converge in a scratch copy without touching the files
    #[arg(long)]
    pub dry_run: bool,

    /// Give up on a file after this many committed fixes
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Seconds before a checker run counts as hung (0 = no limit)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Fix files in parallel
    #[arg(short = 'P', long)]
    pub parallel: bool,

    /// Stop after the first file that does not converge
    #[arg(short = 'F', long)]
    pub fail_fast: bool,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub walk: WalkArgs,

    /// Linter rcfile
    #[arg(long, value_name = "FILE")]
    pub rcfile: Option<PathBuf>,

    /// Print the linter command lines instead of running them
    #[arg(long)]
    pub cmd: bool,

    /// Only output these authors
    #[arg(long, num_args = 1..)]
    pub authors: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RatioArgs {
    #[command(flatten)]
    pub walk: WalkArgs,

    /// Maximum errors per code line, as ERRORS:LINES
    #[arg(long, value_name = "E:L", default_value = crate::ratio::DEFAULT_THRESHOLD)]
    pub error_threshold: String,
}

impl Command {
    pub fn walk(&self) -> &WalkArgs {
        match self {
            Command::Fix(args) => &args.walk,
            Command::Score(args) => &args.walk,
            Command::Ratio(args) => &args.walk,
            Command::Todos(walk) | Command::Lines(walk) => walk,
        }
    }
}
