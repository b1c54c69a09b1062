use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};

use crate::fs::display_path;

/// Per file-type limits. A file is checked by the first rule whose pattern
/// matches its name.
#[derive(Debug, Clone)]
pub struct LineRule {
    pattern: Regex,
    pub max_columns: usize,
    pub allow_tab: bool,
    pub allow_trailing_space: bool,
    pub allow_trailing_backslash: bool,
}

impl LineRule {
    fn new(pattern: &str) -> Self {
        Self {
            pattern: RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .unwrap(),
            max_columns: 80,
            allow_tab: false,
            allow_trailing_space: false,
            allow_trailing_backslash: true,
        }
    }

    fn columns(mut self, max: usize) -> Self {
        self.max_columns = max;
        self
    }
}

static RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule {
            allow_trailing_backslash: false,
            ..LineRule::new(r"\.py$")
        },
        LineRule::new(r"\.java$").columns(100),
        LineRule::new(r"\.r$").columns(80),
        LineRule {
            allow_tab: true,
            ..LineRule::new(r"^Makefile").columns(100)
        },
        LineRule::new(r"\.sql$").columns(100),
        LineRule::new(r"\.sh$").columns(80),
    ]
});

static TRAILING_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+$").unwrap());
static TRAILING_BACKSLASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\\s*$").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#.*$").unwrap());

/// The rule for `path`, if its file type is checked at all.
pub fn rule_for(path: &Path) -> Option<&'static LineRule> {
    let name = path.file_name()?.to_str()?;
    RULES.iter().find(|rule| rule.pattern.is_match(name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Tab,
    TrailingSpace,
    TooWide { columns: usize, limit: usize },
    TrailingBackslash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIssue {
    pub path: String,
    /// 1-based.
    pub line: usize,
    pub kind: IssueKind,
    /// The offending line, marked up to show the problem.
    pub excerpt: Option<String>,
}

impl fmt::Display for LineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: ", self.path, self.line)?;
        match &self.kind {
            IssueKind::Tab => f.write_str("Should not contain tab:")?,
            IssueKind::TrailingSpace => f.write_str("Should not contain trailing space:")?,
            IssueKind::TooWide { columns, limit } => {
                write!(f, "Has {columns} columns (exceeds limit of {limit}):")?
            }
            IssueKind::TrailingBackslash => f.write_str("Please replace backslash with parenthesis")?,
        }
        if let Some(excerpt) = &self.excerpt {
            write!(f, "\n  {excerpt}")?;
        }
        Ok(())
    }
}

/// Check `content` against `rule`. `path` is only used for reporting.
pub fn check_content(path: &str, content: &str, rule: &LineRule) -> Vec<LineIssue> {
    let mut issues = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim_end_matches(['\r', '\n']);
        let issue = |kind, excerpt| LineIssue {
            path: path.to_string(),
            line: idx + 1,
            kind,
            excerpt,
        };

        if !rule.allow_tab && line.contains('\t') {
            issues.push(issue(IssueKind::Tab, Some(line.replace('\t', "<TAB>"))));
        }
        if !rule.allow_trailing_space {
            if let Some(m) = TRAILING_SPACE_RE.find(line) {
                let marked = format!(
                    "{}{} <= space",
                    &line[..m.start()],
                    "_".repeat(m.as_str().chars().count())
                );
                issues.push(issue(IssueKind::TrailingSpace, Some(marked)));
            }
        }
        let columns = line.chars().count();
        if columns > rule.max_columns {
            let keep: String = line.chars().take(rule.max_columns.saturating_sub(4)).collect();
            issues.push(issue(
                IssueKind::TooWide {
                    columns,
                    limit: rule.max_columns,
                },
                Some(format!("{keep}...")),
            ));
        }
        if !rule.allow_trailing_backslash
            && TRAILING_BACKSLASH_RE.is_match(&COMMENT_RE.replace(line, ""))
        {
            issues.push(issue(IssueKind::TrailingBackslash, None));
        }
    }
    issues
}

/// Check every file that has a rule; files without one are ignored.
pub fn check_files(files: &[PathBuf]) -> Result<Vec<LineIssue>> {
    let per_file: Vec<Vec<LineIssue>> = files
        .par_iter()
        .filter_map(|path| rule_for(path).map(|rule| (path, rule)))
        .map(|(path, rule)| -> Result<Vec<LineIssue>> {
            let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
            Ok(check_content(
                &display_path(path),
                &String::from_utf8_lossy(&bytes),
                rule,
            ))
        })
        .collect::<Result<_>>()?;
    Ok(per_file.into_iter().flatten().collect())
}

pub fn render(issues: &[LineIssue]) -> String {
    let mut out = String::new();
    for issue in issues {
        let _ = writeln!(out, "{issue}");
    }
    if !issues.is_empty() {
        let _ = writeln!(out, "File contains {} errors.", issues.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(issues: &[LineIssue]) -> Vec<(usize, IssueKind)> {
        issues.iter().map(|i| (i.line, i.kind.clone())).collect()
    }

    #[test]
    fn rule_table() {
        assert!(!rule_for(Path::new("a.py")).unwrap().allow_trailing_backslash);
        assert_eq!(rule_for(Path::new("A.JAVA")).unwrap().max_columns, 100);
        assert!(rule_for(Path::new("Makefile.in")).unwrap().allow_tab);
        assert_eq!(rule_for(Path::new("x.sh")).unwrap().max_columns, 80);
        assert!(rule_for(Path::new("README.md")).is_none());
    }

    #[test]
    fn python_issues() {
        let rule = rule_for(Path::new("a.py")).unwrap();
        let content = format!(
            "ok = 1\n\tindented = 2\ntrail = 3  \nx = 1 + \\\n{}\n# comment \\\n",
            "y".repeat(81)
        );
        let issues = check_content("a.py", &content, rule);
        assert_eq!(
            kinds(&issues),
            vec![
                (2, IssueKind::Tab),
                (3, IssueKind::TrailingSpace),
                (4, IssueKind::TrailingBackslash),
                (5, IssueKind::TooWide { columns: 81, limit: 80 }),
            ]
        );
        assert_eq!(issues[0].excerpt.as_deref(), Some("<TAB>indented = 2"));
        assert_eq!(issues[1].excerpt.as_deref(), Some("trail = 3__ <= space"));
        assert_eq!(
            issues[3].to_string(),
            format!("a.py:5: Has 81 columns (exceeds limit of 80):\n  {}...", "y".repeat(76))
        );
    }

    #[test]
    fn makefile_allows_tabs() {
        let rule = rule_for(Path::new("Makefile")).unwrap();
        assert!(check_content("Makefile", "all:\n\tcc -o x x.c\n", rule).is_empty());
    }

    #[test]
    fn crlf_is_not_trailing_space() {
        let rule = rule_for(Path::new("a.sh")).unwrap();
        assert!(check_content("a.sh", "echo hi\r\nexit 0\r\n", rule).is_empty());
    }

    #[test]
    fn files_without_rules_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        let sh = dir.path().join("run.sh");
        std::fs::write(&txt, "\ttabbed\n").unwrap();
        std::fs::write(&sh, "\ttabbed\n").unwrap();
        let issues = check_files(&[txt, sh]).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(render(&issues).ends_with("File contains 1 errors.\n"));
    }
}
