use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::DateTime;
use regex::Regex;
use tracing::debug;

use crate::checker::{CheckerError, ExternalCommand};
use crate::config::BlameMode;

/// Author name used when a line has no usable attribution.
pub const UNKNOWN: &str = "UNKNOWN";

// `<hash> [<file>] (<email> <epoch> <tz> <lineno>) <code>`
static GIT_BLAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\^?\w+ .*?\(<(?P<email>[^>]+)>\s+(?P<datestamp>\d+)[^)]+\) ?(?P<code>.*)$")
        .unwrap()
});

// `<rev> <author> <YYYY-MM-DD hh:mm:ss tz (Day, DD Mon YYYY)> <code>`
static SVN_BLAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+\s+(?P<email>\S+)\s+(?P<datestamp>\d{4}.+? \(.+?\d{4}\)) ?(?P<code>.*)$")
        .unwrap()
});

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vcs {
    Git,
    Svn,
}

impl Vcs {
    fn status_template(self) -> &'static str {
        match self {
            Vcs::Git => "git status",
            Vcs::Svn => "svn status",
        }
    }

    fn blame_template(self) -> &'static str {
        match self {
            Vcs::Git => "git blame --show-email -t",
            Vcs::Svn => "svn blame -v",
        }
    }

    fn line_regex(self) -> &'static Regex {
        match self {
            Vcs::Git => &GIT_BLAME_RE,
            Vcs::Svn => &SVN_BLAME_RE,
        }
    }

    /// The first VCS whose `status` succeeds in the current directory.
    pub fn detect(timeout: Option<Duration>) -> Option<Vcs> {
        [Vcs::Git, Vcs::Svn].into_iter().find(|vcs| {
            let Ok(cmd) = ExternalCommand::parse(vcs.status_template()) else {
                return false;
            };
            let ok = cmd
                .with_timeout(timeout)
                .run(Path::new("."))
                .is_ok_and(|out| out.status == Some(0));
            debug!(vcs = ?vcs, ok, "probed version control");
            ok
        })
    }

    /// Resolve the configured mode to a concrete VCS.
    pub fn from_mode(mode: BlameMode, timeout: Option<Duration>) -> Option<Vcs> {
        match mode {
            BlameMode::Auto => Vcs::detect(timeout),
            BlameMode::Git => Some(Vcs::Git),
            BlameMode::Svn => Some(Vcs::Svn),
        }
    }
}

impl fmt::Display for Vcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Vcs::Git => "git",
            Vcs::Svn => "svn",
        })
    }
}

/// When a line was committed. Git reports epoch seconds; svn a free-form date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datestamp {
    Epoch(i64),
    Text(String),
}

impl Datestamp {
    fn parse(raw: &str) -> Datestamp {
        match raw.parse() {
            Ok(secs) => Datestamp::Epoch(secs),
            Err(_) => Datestamp::Text(raw.to_string()),
        }
    }

    /// `YYYY-MM-DD` (UTC for epochs), or `None` when no date can be read.
    pub fn date(&self) -> Option<String> {
        match self {
            Datestamp::Epoch(secs) => {
                DateTime::from_timestamp(*secs, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
            }
            Datestamp::Text(text) => ISO_DATE_RE.find(text).map(|m| m.as_str().to_string()),
        }
    }
}

/// One line of blame output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub email: String,
    pub datestamp: Datestamp,
    pub code: String,
}

/// Parse blame output. Entry `i` belongs to line `i` of the blamed file;
/// lines that don't have the expected shape are `None`.
pub fn parse_blame(vcs: Vcs, output: &str) -> Vec<Option<Attribution>> {
    let re = vcs.line_regex();
    output
        .lines()
        .map(|line| {
            let caps = re.captures(line)?;
            Some(Attribution {
                email: caps["email"].to_string(),
                datestamp: Datestamp::parse(&caps["datestamp"]),
                code: caps["code"].to_string(),
            })
        })
        .collect()
}

/// Source of per-line attribution.
pub trait Blame: Sync {
    fn blame(&self, path: &Path) -> Result<Vec<Option<Attribution>>, CheckerError>;
}

/// Blame through the VCS command line.
#[derive(Debug, Clone)]
pub struct VcsBlame {
    vcs: Vcs,
    timeout: Option<Duration>,
}

impl VcsBlame {
    pub fn new(vcs: Vcs, timeout: Option<Duration>) -> Self {
        Self { vcs, timeout }
    }
}

impl Blame for VcsBlame {
    fn blame(&self, path: &Path) -> Result<Vec<Option<Attribution>>, CheckerError> {
        let cmd = ExternalCommand::parse(self.vcs.blame_template())?.with_timeout(self.timeout);
        let output = cmd.run(path)?;
        if output.status != Some(0) {
            return Err(CheckerError::Failed {
                command: cmd.display_for(path),
                status: output
                    .status
                    .map_or_else(|| "signal".to_string(), |c| format!("code {c}")),
                stderr: output.stderr_lossy().trim().to_string(),
            });
        }
        Ok(parse_blame(self.vcs, &output.stdout_lossy()))
    }
}

/// Maps raw attribution identifiers to display names.
#[derive(Debug, Clone, Default)]
pub struct AuthorAliases {
    map: BTreeMap<String, String>,
}

impl AuthorAliases {
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self { map }
    }

    /// The alias for `raw`, or `raw` itself when there is none.
    pub fn resolve<'a>(&'a self, raw: &'a str) -> &'a str {
        self.map.get(raw).map_or(raw, String::as_str)
    }
}
