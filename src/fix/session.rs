use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempDir};
use thiserror::Error;
use tracing::{debug, warn};

use crate::checker::{Checker, CheckerError};
use crate::fix::patch::{self, PatchError};
use crate::fix::terminator::{LineTerminator, split_lines};
use crate::fix::transform::transform;
use crate::fix::violation::{self, ViolationRecord};

/// Iteration ceiling when nothing else is configured.
pub const DEFAULT_MAX_ITERATIONS: usize = 500;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot prepare working copy of {path}: {source}")]
    WorkingCopy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Checker(#[from] CheckerError),

    #[error("cannot patch working copy: {0}")]
    Patch(#[from] PatchError),

    #[error("cannot write fixed content back to {path}: {source}")]
    Promote {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("still changing after {0} iterations, giving up")]
    IterationCeiling(usize),
}

/// Terminal state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The checker reported nothing. Zero iterations means the file was
    /// already clean.
    Done { iterations: usize },
    /// Diagnostics remain and none of them can be fixed (or the checker hung).
    Stuck {
        iterations: usize,
        remaining: Vec<String>,
        timed_out: bool,
    },
}

/// The state of bringing one file to convergence.
///
/// Patches go to a private working copy in a temporary directory; the
/// original is only touched by [`FixSession::promote`]. The directory is
/// removed when the session is dropped.
#[derive(Debug)]
pub struct FixSession {
    source: PathBuf,
    working_copy: PathBuf,
    terminator: LineTerminator,
    iterations: usize,
    fixed: bool,
    _work_dir: TempDir,
}

impl FixSession {
    pub fn open(source: &Path) -> Result<Self, SessionError> {
        let working_copy_err = |source_err| SessionError::WorkingCopy {
            path: source.to_path_buf(),
            source: source_err,
        };

        let content = fs::read(source).map_err(working_copy_err)?;
        let work_dir = tempfile::Builder::new()
            .prefix("hygiene-")
            .tempdir()
            .map_err(working_copy_err)?;
        let name = source.file_name().unwrap_or_else(|| "working-copy".as_ref());
        let working_copy = work_dir.path().join(name);
        fs::write(&working_copy, &content).map_err(working_copy_err)?;

        let terminator = LineTerminator::detect(&content);
        debug!(path = %source.display(), %terminator, "opened fix session");

        Ok(Self {
            source: source.to_path_buf(),
            working_copy,
            terminator,
            iterations: 0,
            fixed: false,
            _work_dir: work_dir,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn working_copy(&self) -> &Path {
        &self.working_copy
    }

    pub fn terminator(&self) -> LineTerminator {
        self.terminator
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether at least one patch was committed to the working copy.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Commit a patch for the first diagnostic in `diagnostics` that can be
    /// fixed. Later diagnostics are ignored: their rows may be stale once
    /// any edit lands.
    pub fn step(&mut self, diagnostics: &[String]) -> Result<Option<ViolationRecord>, SessionError> {
        let content = fs::read(&self.working_copy).map_err(|source| SessionError::WorkingCopy {
            path: self.working_copy.clone(),
            source,
        })?;
        let lines = split_lines(&content);

        for raw in diagnostics {
            let Some(record) = violation::parse(raw) else {
                debug!(diagnostic = %raw, "not auto-fixable");
                continue;
            };
            let Some(plan) = transform(&record, &lines, self.terminator) else {
                debug!(diagnostic = %raw, "transform is a no-op");
                continue;
            };
            patch::apply(&self.working_copy, &plan)?;
            self.iterations += 1;
            self.fixed = true;
            return Ok(Some(record));
        }
        Ok(None)
    }

    /// Run the checker / patch loop until the checker is silent or nothing
    /// it reports can be fixed.
    pub fn run(
        &mut self,
        checker: &dyn Checker,
        max_iterations: usize,
    ) -> Result<SessionOutcome, SessionError> {
        loop {
            let diagnostics = match checker.check(&self.working_copy) {
                Ok(diagnostics) => diagnostics,
                Err(e) if e.is_timeout() => {
                    warn!(path = %self.source.display(), "{e}");
                    return Ok(SessionOutcome::Stuck {
                        iterations: self.iterations,
                        remaining: Vec::new(),
                        timed_out: true,
                    });
                }
                Err(e) => return Err(e.into()),
            };

            if diagnostics.is_empty() {
                return Ok(SessionOutcome::Done {
                    iterations: self.iterations,
                });
            }
            if self.iterations >= max_iterations {
                return Err(SessionError::IterationCeiling(self.iterations));
            }

            match self.step(&diagnostics)? {
                Some(record) => debug!(
                    path = %self.source.display(),
                    iteration = self.iterations,
                    code = %record.code,
                    row = record.row,
                    col = record.column,
                    "committed fix"
                ),
                None => {
                    return Ok(SessionOutcome::Stuck {
                        iterations: self.iterations,
                        remaining: diagnostics,
                        timed_out: false,
                    });
                }
            }
        }
    }

    /// Replace the original file with the working copy. The new content is
    /// staged next to the original and renamed over it in one step.
    pub fn promote(&self) -> Result<(), SessionError> {
        let promote_err = |source| SessionError::Promote {
            path: self.source.clone(),
            source,
        };

        let dir = self
            .source
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut staged = NamedTempFile::new_in(dir).map_err(promote_err)?;
        let mut reader = File::open(&self.working_copy).map_err(promote_err)?;
        io::copy(&mut reader, staged.as_file_mut()).map_err(promote_err)?;
        staged.as_file().sync_all().map_err(promote_err)?;
        if let Ok(meta) = fs::metadata(&self.source) {
            fs::set_permissions(staged.path(), meta.permissions()).map_err(promote_err)?;
        }
        staged.persist(&self.source).map_err(|e| promote_err(e.error))?;
        Ok(())
    }
}
