use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::fix::terminator::{read_raw_line, split_lines};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("patch needs lines {start}..{end} but the file has only {available}")]
    PlanOutOfRange {
        start: usize,
        end: usize,
        available: usize,
    },
}

/// A line-level rewrite of one file.
///
/// Lines `0..keep` are copied verbatim, the next `remove` lines are dropped,
/// `replacement` is written in their place (terminators already rendered),
/// and copying resumes at [`PatchPlan::resume_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    pub keep: usize,
    pub remove: usize,
    pub replacement: Vec<u8>,
}

impl PatchPlan {
    /// Insert `lines` (fully terminated) before 0-based line `at`.
    pub fn insert(at: usize, lines: Vec<u8>) -> Self {
        Self {
            keep: at,
            remove: 0,
            replacement: lines,
        }
    }

    /// Drop 0-based line `at`.
    pub fn delete(at: usize) -> Self {
        Self {
            keep: at,
            remove: 1,
            replacement: Vec::new(),
        }
    }

    /// Swap 0-based line `at` for `line` (terminator included).
    pub fn replace(at: usize, line: Vec<u8>) -> Self {
        Self {
            keep: at,
            remove: 1,
            replacement: line,
        }
    }

    /// First line of the original file copied after the replacement.
    pub fn resume_at(&self) -> usize {
        self.keep + self.remove
    }

    /// Net change in the file's line count.
    pub fn line_delta(&self) -> isize {
        split_lines(&self.replacement).len() as isize - self.remove as isize
    }

    /// Apply to an in-memory buffer.
    pub fn apply_to(&self, content: &[u8]) -> Result<Vec<u8>, PatchError> {
        let mut out = Vec::with_capacity(content.len() + self.replacement.len());
        apply_stream(content, &mut out, self)?;
        Ok(out)
    }
}

/// Stream `reader` to `writer`, rewriting the span described by `plan`.
/// Bytes outside the span are copied unchanged, terminators included.
pub fn apply_stream<R: BufRead, W: Write>(
    mut reader: R,
    writer: &mut W,
    plan: &PatchPlan,
) -> Result<(), PatchError> {
    let mut line = Vec::new();
    for copied in 0..plan.keep {
        line.clear();
        if read_raw_line(&mut reader, &mut line)? == 0 {
            return Err(PatchError::PlanOutOfRange {
                start: plan.keep,
                end: plan.resume_at(),
                available: copied,
            });
        }
        writer.write_all(&line)?;
    }

    writer.write_all(&plan.replacement)?;

    for skipped in 0..plan.remove {
        line.clear();
        if read_raw_line(&mut reader, &mut line)? == 0 {
            return Err(PatchError::PlanOutOfRange {
                start: plan.keep,
                end: plan.resume_at(),
                available: plan.keep + skipped,
            });
        }
    }

    io::copy(&mut reader, writer)?;
    Ok(())
}

/// Rewrite `working_copy` in place according to `plan`.
///
/// The new content goes to a temporary file next to the working copy and is
/// renamed over it only after a full, flushed write. On any error the
/// temporary file is removed and the working copy is left as it was.
pub fn apply(working_copy: &Path, plan: &PatchPlan) -> Result<(), PatchError> {
    let dir = working_copy
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let reader = BufReader::new(File::open(working_copy)?);
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        apply_stream(reader, &mut writer, plan)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(working_copy).map_err(|e| e.error)?;
    Ok(())
}
