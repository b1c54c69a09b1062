use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use tracing::warn;

use crate::blame::{AuthorAliases, Blame, Datestamp, UNKNOWN};
use crate::fs::display_path;

static TODO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:TODO|FIXME)\((?P<name>[^)]+)\)(?P<msg1>.*))|(?:(?:TODO|FIXME)[:\s](?P<msg2>.*))")
        .unwrap()
});

static TODO_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(py|rb|java|pl|sh|sql|r)$").unwrap());

/// Whether a file is searched for markers.
pub fn is_todo_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    TODO_FILE_RE.is_match(name) || name.starts_with("Makefile")
}

/// A TODO or FIXME marker in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    pub path: String,
    /// 0-based line index.
    pub line: usize,
    /// The name in `TODO(name)`, aliased.
    pub owner: Option<String>,
    /// Who committed the line, aliased.
    pub committer: Option<String>,
    pub datestamp: Option<Datestamp>,
    pub message: String,
}

impl Todo {
    /// The author the marker is filed under.
    pub fn author(&self) -> &str {
        self.owner
            .as_deref()
            .or(self.committer.as_deref())
            .unwrap_or(UNKNOWN)
    }
}

impl fmt::Display for Todo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self
            .datestamp
            .as_ref()
            .and_then(Datestamp::date)
            .unwrap_or_else(|| UNKNOWN.to_string());
        match (&self.committer, &self.owner) {
            (Some(committer), Some(owner)) if committer != owner => write!(
                f,
                "{date} {}: TODO({committer}->{owner}): {}",
                self.path, self.message
            ),
            _ => write!(f, "{date} {}: TODO({}): {}", self.path, self.author(), self.message),
        }
    }
}

/// Markers in `content` as (line index, owner, message).
pub fn scan(content: &str) -> Vec<(usize, Option<String>, String)> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let caps = TODO_RE.captures(line)?;
            let owner = caps.name("name").map(|m| m.as_str().to_string());
            let message = caps
                .name("msg1")
                .or(caps.name("msg2"))
                .map_or("", |m| m.as_str());
            let message = message.trim_start_matches(':').trim().to_string();
            Some((idx, owner, message))
        })
        .collect()
}

fn todos_in_file(path: &Path, blame: &dyn Blame, aliases: &AuthorAliases) -> Vec<Todo> {
    let name = display_path(path);
    let content = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(path = %name, "cannot read: {e}");
            return Vec::new();
        }
    };
    let markers = scan(&content);
    if markers.is_empty() {
        return Vec::new();
    }

    let attribution = blame.blame(path).unwrap_or_else(|e| {
        warn!(path = %name, "blame failed: {e}");
        Vec::new()
    });

    markers
        .into_iter()
        .map(|(line, owner, message)| {
            let attributed = attribution.get(line).and_then(Option::as_ref);
            Todo {
                path: name.clone(),
                line,
                owner: owner.map(|o| aliases.resolve(&o).to_string()),
                committer: attributed.map(|a| aliases.resolve(&a.email).to_string()),
                datestamp: attributed.map(|a| a.datestamp.clone()),
                message,
            }
        })
        .collect()
}

/// Markers from every file, grouped by author.
pub fn collect_todos(
    files: &[PathBuf],
    blame: &dyn Blame,
    aliases: &AuthorAliases,
) -> BTreeMap<String, Vec<Todo>> {
    let todos: Vec<Todo> = files
        .par_iter()
        .flat_map_iter(|path| todos_in_file(path, blame, aliases))
        .collect();

    let mut by_author: BTreeMap<String, Vec<Todo>> = BTreeMap::new();
    for todo in todos {
        by_author.entry(todo.author().to_string()).or_default().push(todo);
    }
    by_author
}

pub fn render(by_author: &BTreeMap<String, Vec<Todo>>) -> String {
    let mut out = String::new();
    for (idx, (author, todos)) in by_author.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "TODO({author}): {author} has {} items.", todos.len());
        for todo in todos {
            let _ = writeln!(out, "{todo}");
        }
    }
    out
}
