use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::diagnostic::Diagnostic;

static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"expected (\d+) blank lines?\b.*?, found (\d+)").unwrap());

/// Violation categories the fixer knows how to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Fewer blank lines than required before the reported row.
    BlankLineDeficit { required: usize, found: usize },
    /// One offending character sits at the reported column.
    StrayCharacter,
    /// Backslash continuation inside brackets.
    RedundantContinuation,
    /// Too many blank lines before the reported row.
    ExcessBlankLines,
    /// A space is missing immediately before the reported column.
    MissingWhitespaceBefore,
    /// A space is missing immediately after the reported column.
    MissingWhitespaceAfter,
    /// Comment marker run (`#`, `##text`, `#  text`) not followed by exactly one space.
    MalformedCommentMarker,
}

impl Violation {
    /// Map a checker code (plus its message, for codes that carry counts)
    /// to a category. Unknown codes are not fixable.
    pub fn classify(code: &str, message: &str) -> Option<Violation> {
        let violation = match code {
            "E301" | "E302" | "E305" | "E306" => {
                let caps = BLANK_LINES_RE.captures(message)?;
                Violation::BlankLineDeficit {
                    required: caps[1].parse().ok()?,
                    found: caps[2].parse().ok()?,
                }
            }
            "E201" | "E202" | "E203" | "E211" | "E221" | "E222" | "E241" | "E251" | "E271"
            | "E272" | "E703" => Violation::StrayCharacter,
            "E502" => Violation::RedundantContinuation,
            "E303" | "E304" => Violation::ExcessBlankLines,
            "E225" | "E226" | "E227" | "E228" | "E261" => Violation::MissingWhitespaceBefore,
            "E231" => Violation::MissingWhitespaceAfter,
            "E262" | "E266" => Violation::MalformedCommentMarker,
            _ => return None,
        };
        Some(violation)
    }
}

/// A fixable diagnostic. Row and column are 1-based, as the checker reports
/// them, and refer to the working copy the checker just read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationRecord {
    pub row: usize,
    pub column: usize,
    pub code: String,
    pub kind: Violation,
}

impl ViolationRecord {
    pub fn from_diagnostic(diagnostic: &Diagnostic) -> Option<ViolationRecord> {
        let kind = Violation::classify(&diagnostic.code, &diagnostic.message)?;
        Some(ViolationRecord {
            row: diagnostic.location.line,
            column: diagnostic.location.column,
            code: diagnostic.code.clone(),
            kind,
        })
    }
}

impl fmt::Display for ViolationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.row, self.column, self.code)
    }
}

/// Parse one raw checker line into a fixable violation.
///
/// `None` means "not auto-fixable, skip": the line is not a diagnostic, or
/// its code is not one this tool repairs.
pub fn parse(diagnostic_line: &str) -> Option<ViolationRecord> {
    let diagnostic = Diagnostic::parse(diagnostic_line)?;
    ViolationRecord::from_diagnostic(&diagnostic)
}
