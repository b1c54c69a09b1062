pub mod patch;
pub mod session;
pub mod terminator;
pub mod transform;
pub mod violation;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info};

use crate::checker::Checker;
use session::{FixSession, SessionError, SessionOutcome};

/// How a fix run treats each file.
#[derive(Debug, Clone)]
pub struct FixOptions {
    pub max_iterations: usize,
    /// Converge in the working copy but never write the original.
    pub dry_run: bool,
    pub parallel: bool,
    /// Stop starting new files after the first stuck or failed one.
    pub fail_fast: bool,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            max_iterations: session::DEFAULT_MAX_ITERATIONS,
            dry_run: false,
            parallel: false,
            fail_fast: false,
        }
    }
}

/// Per-file result of a fix run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Unchanged,
    Fixed {
        iterations: usize,
    },
    Stuck {
        iterations: usize,
        remaining: Vec<String>,
        timed_out: bool,
    },
    Failed {
        error: String,
    },
}

impl FileStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, FileStatus::Unchanged | FileStatus::Fixed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct FixReport {
    pub files: Vec<FileReport>,
}

impl FixReport {
    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }

    pub fn unchanged_count(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Unchanged))
    }

    pub fn fixed_count(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Fixed { .. }))
    }

    pub fn stuck_count(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Stuck { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.files.iter().all(|f| f.status.is_success())
    }

    /// 0 when every file is unchanged or fixed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

/// Bring one file to convergence. Never fails: errors become
/// [`FileStatus::Failed`] and the original is left as it was.
pub fn fix_file(path: &Path, checker: &dyn Checker, options: &FixOptions) -> FileStatus {
    match run_session(path, checker, options) {
        Ok(status) => status,
        Err(e) => {
            error!(path = %path.display(), "{e}");
            FileStatus::Failed {
                error: e.to_string(),
            }
        }
    }
}

fn run_session(
    path: &Path,
    checker: &dyn Checker,
    options: &FixOptions,
) -> Result<FileStatus, SessionError> {
    let mut session = FixSession::open(path)?;
    let outcome = session.run(checker, options.max_iterations)?;

    // Partial progress on a stuck file is kept too.
    if session.is_fixed() && !options.dry_run {
        session.promote()?;
    }

    let status = match outcome {
        SessionOutcome::Done { iterations: 0 } => FileStatus::Unchanged,
        SessionOutcome::Done { iterations } => {
            info!(path = %path.display(), iterations, "fixed");
            FileStatus::Fixed { iterations }
        }
        SessionOutcome::Stuck {
            iterations,
            remaining,
            timed_out,
        } => {
            info!(path = %path.display(), iterations, remaining = remaining.len(), "stuck");
            FileStatus::Stuck {
                iterations,
                remaining,
                timed_out,
            }
        }
    };
    Ok(status)
}

/// Fix every file in `files`. Reports come back in input order even when
/// sessions run in parallel.
pub fn run_fixer(files: &[PathBuf], checker: &dyn Checker, options: &FixOptions) -> FixReport {
    let stop = AtomicBool::new(false);

    let fix_one = |path: &PathBuf| -> Option<FileReport> {
        // --fail-fast: skip remaining files once one did not converge
        if options.fail_fast && stop.load(Ordering::Relaxed) {
            return None;
        }
        let status = fix_file(path, checker, options);
        if options.fail_fast && !status.is_success() {
            stop.store(true, Ordering::Relaxed);
        }
        Some(FileReport {
            path: path.clone(),
            status,
        })
    };

    let files = if options.parallel {
        files.par_iter().filter_map(fix_one).collect()
    } else {
        files.iter().map_while(fix_one).collect()
    };
    FixReport { files }
}
