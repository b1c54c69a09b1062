use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// `<path>:<row>:<col>: <CODE> <message>`. The path is matched lazily: it
/// ends at the first `:<row>:<col>:` that is followed by a code.
static DIAGNOSTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<path>.+?):(?P<line>\d+):(?P<col>\d+):\s*(?P<code>[A-Za-z]+\d+)\b\s*(?P<message>.*)$")
        .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location {
    /// 1-indexed line number
    pub line: usize,
    /// 1-indexed column, as printed by the checker
    pub column: usize,
}

/// One line of checker output, split into its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: String,
    pub location: Location,
    pub code: String,
    pub message: String,
}

impl Diagnostic {
    /// Parse a raw checker line. Returns `None` for anything that is not a
    /// located diagnostic (banners, summaries, blank lines).
    pub fn parse(raw: &str) -> Option<Diagnostic> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let caps = DIAGNOSTIC_RE.captures(raw)?;
        let line = caps["line"].parse().ok()?;
        let column = caps["col"].parse().ok()?;
        Some(Diagnostic {
            path: caps["path"].to_string(),
            location: Location { line, column },
            code: caps["code"].to_string(),
            message: caps["message"].trim_end().to_string(),
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} {}",
            self.path, self.location.line, self.location.column, self.code, self.message,
        )
    }
}
