use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, warn};

use crate::blame::{AuthorAliases, Blame};
use crate::checker::{CheckerError, ExternalCommand};
use crate::fs::display_path;

/// Summary row that totals every author.
pub const EVERYONE: &str = "<everyone>";

static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Your code has been rated at (-?\d+(?:\.\d+)?)").unwrap());

/// The score from linter output. The last rating line wins; negative
/// ratings clamp to -0.01.
pub fn parse_score(output: &str) -> Option<f64> {
    let score = output
        .lines()
        .filter_map(|line| SCORE_RE.captures(line.trim_start()))
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .last()?;
    Some(if score < 0.0 { -0.01 } else { score })
}

/// Produces the raw report of a score linter.
pub trait Linter: Sync {
    fn lint(&self, path: &Path) -> Result<String, CheckerError>;
}

/// A linter run as a subprocess. Its exit code is a bit mask of message
/// categories, so any exit code is accepted; only spawn failures, signals
/// and timeouts are errors.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    command: ExternalCommand,
}

impl CommandLinter {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl Linter for CommandLinter {
    fn lint(&self, path: &Path) -> Result<String, CheckerError> {
        let output = self.command.run(path)?;
        if output.status.is_none() {
            return Err(CheckerError::Failed {
                command: self.command.display_for(path),
                status: "signal".to_string(),
                stderr: output.stderr_lossy().trim().to_string(),
            });
        }
        Ok(output.stdout_lossy().into_owned())
    }
}

/// Line and score totals for one file, path or author.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub lines: usize,
    pub sum_score: f64,
    /// Lines per contributing author.
    pub author_lines: BTreeMap<String, usize>,
}

impl Tally {
    fn add(&mut self, author: &str, score: f64) {
        self.lines += 1;
        self.sum_score += score;
        *self.author_lines.entry(author.to_string()).or_default() += 1;
    }

    /// Line-weighted average score.
    pub fn average(&self) -> Option<f64> {
        (self.lines > 0).then(|| self.sum_score / self.lines as f64)
    }
}

/// Scores aggregated per file, per top-level path and per author.
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    pub files: BTreeMap<String, Tally>,
    pub paths: BTreeMap<String, Tally>,
    pub authors: BTreeMap<String, Tally>,
}

impl ScoreBoard {
    /// Credit one line of `file`, written by `author`, with the file's score.
    pub fn add_line(&mut self, file: &str, author: &str, score: f64) {
        self.files.entry(file.to_string()).or_default().add(author, score);
        self.paths
            .entry(top_level(file).to_string())
            .or_default()
            .add(author, score);
        self.authors.entry(author.to_string()).or_default().add(author, score);
        self.authors.entry(EVERYONE.to_string()).or_default().add(author, score);
    }

    /// The three report sections. When `only` is non-empty, rows with no
    /// line by one of those authors are left out.
    pub fn render(&self, only: &[String]) -> String {
        let only: BTreeSet<&str> = only.iter().map(String::as_str).collect();
        let mut out = String::from("File Statistics:\n");
        for (name, tally) in sorted(&self.files) {
            render_file_path(&mut out, name, tally, &only);
        }
        out.push_str("\nPath Summary:\n");
        for (name, tally) in sorted(&self.paths) {
            render_file_path(&mut out, name, tally, &only);
        }
        out.push_str("\nAuthor Summary:\n");
        for (name, tally) in sorted(&self.authors) {
            if !only.is_empty() && !only.contains(name) {
                continue;
            }
            let _ = writeln!(
                out,
                "{name} scores {:.2} ({} lines)",
                tally.average().unwrap_or_default(),
                tally.lines
            );
        }
        out
    }
}

fn render_file_path(out: &mut String, name: &str, tally: &Tally, only: &BTreeSet<&str>) {
    if !only.is_empty() && !tally.author_lines.keys().any(|a| only.contains(a.as_str())) {
        return;
    }
    let _ = writeln!(
        out,
        "{name} scores {:.2} with {} lines",
        tally.average().unwrap_or_default(),
        tally.lines
    );
    for (author, lines) in &tally.author_lines {
        if only.is_empty() || only.contains(author.as_str()) {
            let _ = writeln!(out, "  {author} wrote {lines} lines");
        }
    }
}

fn sorted(map: &BTreeMap<String, Tally>) -> Vec<(&str, &Tally)> {
    let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
    entries.sort_by_key(|(name, _)| name.to_lowercase());
    entries
}

/// First path component; root-level files are their own path.
fn top_level(file: &str) -> &str {
    let trimmed = file.trim_start_matches('/');
    trimmed.split('/').next().unwrap_or(trimmed)
}

/// One scored file: its display name, score and the author of each
/// non-empty attributed line.
struct FileScore {
    name: String,
    score: f64,
    authors: Vec<String>,
}

fn score_file(
    path: &Path,
    linter: &dyn Linter,
    blame: &dyn Blame,
    aliases: &AuthorAliases,
) -> Option<FileScore> {
    let name = display_path(path);
    let report = match linter.lint(path) {
        Ok(report) => report,
        Err(e) => {
            warn!(path = %name, "linter failed: {e}");
            return None;
        }
    };
    let Some(score) = parse_score(&report) else {
        warn!(path = %name, "no score in linter output, skipping");
        return None;
    };
    let attribution = match blame.blame(path) {
        Ok(lines) => lines,
        Err(e) => {
            warn!(path = %name, "blame failed: {e}");
            return None;
        }
    };
    let authors = attribution
        .into_iter()
        .flatten()
        .filter(|line| !line.code.is_empty())
        .map(|line| aliases.resolve(&line.email).to_string())
        .collect();
    debug!(path = %name, score, "scored");
    Some(FileScore {
        name,
        score,
        authors,
    })
}

/// Lint and blame every file and fold the results into a [`ScoreBoard`].
/// Files without a score or attribution are skipped with a warning.
pub fn collect_scores(
    files: &[PathBuf],
    linter: &dyn Linter,
    blame: &dyn Blame,
    aliases: &AuthorAliases,
) -> ScoreBoard {
    let scored: Vec<FileScore> = files
        .par_iter()
        .filter_map(|path| score_file(path, linter, blame, aliases))
        .collect();

    let mut board = ScoreBoard::default();
    for file in &scored {
        for author in &file.authors {
            board.add_line(&file.name, author, file.score);
        }
    }
    board
}
