use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use regex::Regex;
use tracing::error;

use crate::checker::Checker;
use crate::fs::display_path;

pub const DEFAULT_THRESHOLD: &str = "0:1";

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#.*").unwrap());

/// Parse an `errors:lines` threshold into a ratio.
pub fn parse_threshold(text: &str) -> Result<f64> {
    let (errors, lines) = text
        .split_once(':')
        .with_context(|| format!("threshold must look like ERRORS:LINES, got {text:?}"))?;
    let errors: f64 = errors
        .trim()
        .parse()
        .with_context(|| format!("invalid error count in threshold {text:?}"))?;
    let lines: f64 = lines
        .trim()
        .parse()
        .with_context(|| format!("invalid line count in threshold {text:?}"))?;
    if lines <= 0.0 {
        bail!("line count in threshold {text:?} must be positive");
    }
    Ok(errors / lines)
}

/// Lines that still have something left once comments and whitespace are removed.
pub fn count_code_lines(content: &str) -> usize {
    content
        .lines()
        .filter(|line| {
            COMMENT_RE
                .replace(line, "")
                .chars()
                .any(|c| !c.is_whitespace())
        })
        .count()
}

/// A file the checker had something to say about.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRatio {
    pub path: String,
    pub diagnostics: Vec<String>,
    pub code_lines: usize,
    /// Diagnostics per code line; infinite when there are no code lines.
    pub ratio: f64,
    pub too_many: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RatioReport {
    pub files: Vec<FileRatio>,
    /// Files the checker could not be run on, with the reason.
    pub failures: Vec<(String, String)>,
}

impl RatioReport {
    pub fn exceeded(&self) -> bool {
        self.files.iter().any(|f| f.too_many)
    }

    pub fn exit_code(&self) -> i32 {
        if self.exceeded() || !self.failures.is_empty() { 1 } else { 0 }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            if file.too_many {
                let _ = writeln!(out, "TOO MANY ERRORS: {}", file.path);
            }
            for diagnostic in &file.diagnostics {
                let _ = writeln!(out, "{diagnostic}");
            }
        }
        out
    }
}

fn check_file(path: &Path, checker: &dyn Checker, threshold: f64) -> Result<Option<FileRatio>> {
    let diagnostics = checker.check(path)?;
    if diagnostics.is_empty() {
        return Ok(None);
    }
    let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let code_lines = count_code_lines(&String::from_utf8_lossy(&bytes));
    let ratio = if code_lines == 0 {
        f64::INFINITY
    } else {
        diagnostics.len() as f64 / code_lines as f64
    };
    Ok(Some(FileRatio {
        path: display_path(path),
        too_many: ratio > threshold,
        diagnostics,
        code_lines,
        ratio,
    }))
}

/// Run the checker over every file and compare each error ratio with `threshold`.
pub fn check_ratios(files: &[PathBuf], checker: &dyn Checker, threshold: f64) -> RatioReport {
    let results: Vec<(PathBuf, Result<Option<FileRatio>>)> = files
        .par_iter()
        .map(|path| (path.clone(), check_file(path, checker, threshold)))
        .collect();

    let mut report = RatioReport::default();
    for (path, result) in results {
        match result {
            Ok(Some(file)) => report.files.push(file),
            Ok(None) => {}
            Err(e) => {
                error!(path = %path.display(), "{e:#}");
                report.failures.push((display_path(&path), format!("{e:#}")));
            }
        }
    }
    report
}
