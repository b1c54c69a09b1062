use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use regex::Regex;

/// How directory arguments are walked.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Matched against the path relative to the directory argument;
    /// directories carry a trailing `/` and are pruned on a match.
    pub skip: Vec<Regex>,
    pub recursive: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            skip: Vec::new(),
            recursive: true,
        }
    }
}

/// Accept files whose extension is one of `extensions` (no leading dot).
pub fn has_extension(extensions: &[String]) -> impl Fn(&Path) -> bool + '_ {
    move |path: &Path| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e == ext))
    }
}

/// Discover files from the given paths, respecting .gitignore, hidden
/// files and skip patterns. Directory entries must pass `accept`.
pub fn discover_files(
    paths: &[PathBuf],
    options: &WalkOptions,
    accept: &dyn Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            // Direct file paths bypass extension filtering
            files.push(path.clone());
        } else if path.is_dir() {
            files.extend(walk_directory(path, options, accept)?);
        } else {
            anyhow::bail!("path does not exist: {}", path.display());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn walk_directory(
    dir: &Path,
    options: &WalkOptions,
    accept: &dyn Fn(&Path) -> bool,
) -> Result<Vec<PathBuf>> {
    let mut builder = WalkBuilder::new(dir);
    builder.hidden(true).git_ignore(true).git_global(true);
    if !options.recursive {
        builder.max_depth(Some(1));
    }

    if !options.skip.is_empty() {
        let skip = options.skip.clone();
        let root = dir.to_path_buf();
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !is_skipped(&root, entry.path(), is_dir, &skip)
        });
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry.context("error walking directory")?;
        let path = entry.path();
        if path.is_file() && accept(path) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// `path` with any leading `./` removed and `/` separators, for reports.
pub fn display_path(path: &Path) -> String {
    let shown = path.to_string_lossy().replace('\\', "/");
    let mut rest = shown.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

fn is_skipped(root: &Path, path: &Path, is_dir: bool, skip: &[Regex]) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    if rel.as_os_str().is_empty() {
        return false;
    }
    let mut rel = rel.to_string_lossy().replace('\\', "/");
    if is_dir {
        rel.push('/');
    }
    skip.iter().any(|re| re.is_match(&rel))
}
