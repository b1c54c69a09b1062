use std::io::Write;

use crate::fix::{FileStatus, FixReport};
use crate::formatter::Formatter;

pub struct TextFormatter;

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

impl Formatter for TextFormatter {
    fn format_to(&self, report: &FixReport, out: &mut dyn Write) {
        for file in &report.files {
            let path = file.path.display();
            let _ = match &file.status {
                FileStatus::Unchanged => writeln!(out, "{path}: unchanged"),
                FileStatus::Fixed { iterations } => writeln!(
                    out,
                    "{path}: fixed after {}",
                    plural(*iterations, "iteration", "iterations")
                ),
                FileStatus::Stuck {
                    timed_out: true,
                    iterations,
                    ..
                } => writeln!(
                    out,
                    "{path}: stuck, checker timed out (after {})",
                    plural(*iterations, "iteration", "iterations")
                ),
                FileStatus::Stuck {
                    iterations,
                    remaining,
                    ..
                } => {
                    let _ = writeln!(
                        out,
                        "{path}: stuck with {} (after {})",
                        plural(remaining.len(), "unresolved diagnostic", "unresolved diagnostics"),
                        plural(*iterations, "iteration", "iterations")
                    );
                    remaining
                        .iter()
                        .try_for_each(|diagnostic| writeln!(out, "  {diagnostic}"))
                }
                FileStatus::Failed { error } => writeln!(out, "{path}: failed: {error}"),
            };
        }
        let _ = writeln!(
            out,
            "\n{} inspected, {} fixed, {} unchanged, {} stuck, {} failed",
            plural(report.files.len(), "file", "files"),
            report.fixed_count(),
            report.unchanged_count(),
            report.stuck_count(),
            report.failed_count(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::FileReport;
    use std::path::PathBuf;

    fn render(report: &FixReport) -> String {
        let mut buf = Vec::new();
        TextFormatter.format_to(report, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    fn file(path: &str, status: FileStatus) -> FileReport {
        FileReport {
            path: PathBuf::from(path),
            status,
        }
    }

    #[test]
    fn empty_report() {
        assert_eq!(
            render(&FixReport::default()),
            "\n0 files inspected, 0 fixed, 0 unchanged, 0 stuck, 0 failed\n"
        );
    }

    #[test]
    fn every_status() {
        let report = FixReport {
            files: vec![
                file("a.py", FileStatus::Unchanged),
                file("b.py", FileStatus::Fixed { iterations: 1 }),
                file(
                    "c.py",
                    FileStatus::Stuck {
                        iterations: 2,
                        remaining: vec![
                            "c.py:4:1: E303 too many blank lines (3)".into(),
                            "c.py:9:80: E501 line too long (88 > 79 characters)".into(),
                        ],
                        timed_out: false,
                    },
                ),
                file(
                    "d.py",
                    FileStatus::Stuck {
                        iterations: 0,
                        remaining: vec![],
                        timed_out: true,
                    },
                ),
                file("e.py", FileStatus::Failed { error: "'pycodestyle' exited with code 2".into() }),
            ],
        };
        assert_eq!(
            render(&report),
            "\
a.py: unchanged
b.py: fixed after 1 iteration
c.py: stuck with 2 unresolved diagnostics (after 2 iterations)
  c.py:4:1: E303 too many blank lines (3)
  c.py:9:80: E501 line too long (88 > 79 characters)
d.py: stuck, checker timed out (after 0 iterations)
e.py: failed: 'pycodestyle' exited with code 2

5 files inspected, 1 fixed, 1 unchanged, 2 stuck, 1 failed
"
        );
    }
}
