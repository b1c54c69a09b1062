use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = ".hygiene.yml";

/// Which version control system attributes lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlameMode {
    /// Probe the working directory: git first, then svn.
    #[default]
    Auto,
    Git,
    Svn,
}

/// Settings from `.hygiene.yml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Command the fixer converges against. The file path is appended.
    pub checker: String,
    /// Command whose diagnostics the ratio gate counts.
    pub ratio_checker: String,
    /// Linter whose summary line carries the file score.
    pub linter: String,
    pub rcfile: Option<PathBuf>,
    pub blame: BlameMode,
    /// Extensions (without the dot) visited when walking directories.
    pub extensions: Vec<String>,
    /// Regexes matched against root-relative paths.
    pub skip: Vec<String>,
    pub max_iterations: usize,
    /// Per external invocation; 0 disables the timeout.
    pub timeout_secs: u64,
    /// Raw attribution identifier (usually an email) to display name.
    pub authors: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checker: "pycodestyle --ignore=E265,E501,W291,W293".to_string(),
            ratio_checker: "pycodestyle".to_string(),
            linter: "pylint".to_string(),
            rcfile: None,
            blame: BlameMode::Auto,
            extensions: vec!["py".to_string()],
            skip: Vec::new(),
            max_iterations: crate::fix::session::DEFAULT_MAX_ITERATIONS,
            timeout_secs: 60,
            authors: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn skip_patterns(&self) -> Result<Vec<Regex>> {
        compile_patterns(&self.skip)
    }

    /// Linter command with `--rcfile` applied.
    pub fn linter_command(&self) -> String {
        match &self.rcfile {
            Some(rc) => format!("{} --rcfile={}", self.linter, rc.display()),
            None => self.linter.clone(),
        }
    }
}

pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("invalid skip pattern: {p}")))
        .collect()
}

/// Load config from the given path, or look for `.hygiene.yml` in the
/// current directory. Returns defaults if the default file doesn't exist;
/// an explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(Config::default());
            }
            default.to_path_buf()
        }
    };

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read config {}", config_path.display()))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    config.skip_patterns()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(DEFAULT_CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/.hygiene.yml"))).is_err());
    }

    #[test]
    fn empty_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "\n");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.linter_command(), "pylint");
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "checker: flake8\nblame: svn\nskip:\n  - '^vendor/'\ntimeout_secs: 0\nauthors:\n  jdoe@example.com: Jane\n",
        );
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.checker, "flake8");
        assert_eq!(config.blame, BlameMode::Svn);
        assert_eq!(config.skip, vec!["^vendor/"]);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.authors["jdoe@example.com"], "Jane");
        assert_eq!(config.extensions, vec!["py"]);
        assert_eq!(config.max_iterations, 500);
    }

    #[test]
    fn rcfile_is_appended_to_linter() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "rcfile: tools/pylintrc\n");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.linter_command(), "pylint --rcfile=tools/pylintrc");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "chekcer: flake8\n");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("chekcer"), "{err:#}");
    }

    #[test]
    fn invalid_skip_regex_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "skip: ['(unclosed']\n");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("invalid skip pattern"));
    }
}
