//! Integration tests for the hygiene fixing pipeline.
//!
//! These tests drive whole fix sessions: working copy, checker loop,
//! transforms, patch application and promotion. Most use an in-process
//! checker that mimics a handful of pycodestyle rules; on unix a few run a
//! real shell-script checker through the subprocess runner.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use hygiene::checker::{Checker, CheckerError};
use hygiene::cli::Args;
use hygiene::fix::terminator::split_lines;
use hygiene::fix::{FileStatus, FixOptions, fix_file, run_fixer};

fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Mimics pycodestyle for E201, E302 and E303, in that order per line.
struct MiniStyle;

impl Checker for MiniStyle {
    fn check(&self, path: &Path) -> Result<Vec<String>, CheckerError> {
        let bytes = fs::read(path).map_err(|source| CheckerError::Spawn {
            command: "mini-style".into(),
            source,
        })?;
        let name = path.display();
        let mut out = Vec::new();
        let mut blanks = 0;
        for (idx, line) in split_lines(&bytes).iter().enumerate() {
            if line.is_blank() {
                blanks += 1;
                continue;
            }
            let row = idx + 1;
            let text = String::from_utf8_lossy(line.content);
            if blanks > 2 {
                out.push(format!("{name}:{row}:1: E303 too many blank lines ({blanks})"));
            } else if text.starts_with("def ") && idx > 0 && blanks < 2 {
                out.push(format!(
                    "{name}:{row}:1: E302 expected 2 blank lines, found {blanks}"
                ));
            }
            if let Some(at) = text.find("( ") {
                out.push(format!("{name}:{row}:{}: E201 whitespace after '('", at + 2));
            }
            blanks = 0;
        }
        Ok(out)
    }
}

/// Reports the same diagnostic on every run.
struct Repeats(&'static str);

impl Checker for Repeats {
    fn check(&self, _path: &Path) -> Result<Vec<String>, CheckerError> {
        Ok(vec![self.0.to_string()])
    }
}

fn fix(path: &Path) -> FileStatus {
    fix_file(path, &MiniStyle, &FixOptions::default())
}

// ---------- Scenarios ----------

#[test]
fn blank_line_deficit_inserts_one_line() {
    let dir = temp_dir();
    let file = write_file(dir.path(), "mod.py", b"import os\n\ndef f():\n    pass\n");

    assert_eq!(fix(&file), FileStatus::Fixed { iterations: 1 });
    assert_eq!(
        fs::read(&file).unwrap(),
        b"import os\n\n\ndef f():\n    pass\n"
    );
}

#[test]
fn clean_file_is_unchanged() {
    let dir = temp_dir();
    let content = b"import os\n\n\ndef f():\n    pass\n";
    let file = write_file(dir.path(), "mod.py", content);

    assert_eq!(fix(&file), FileStatus::Unchanged);
    assert_eq!(fs::read(&file).unwrap(), content);
}

#[test]
fn repeated_noop_diagnostic_is_stuck() {
    let dir = temp_dir();
    let file = write_file(dir.path(), "mod.py", b"f(x)\n");
    let diagnostic = "mod.py:1:40: E201 whitespace after '('";

    let status = fix_file(&file, &Repeats(diagnostic), &FixOptions::default());

    assert_eq!(
        status,
        FileStatus::Stuck {
            iterations: 0,
            remaining: vec![diagnostic.to_string()],
            timed_out: false,
        }
    );
    assert_eq!(fs::read(&file).unwrap(), b"f(x)\n");
}

#[test]
fn paren_space_removed_rest_untouched() {
    let dir = temp_dir();
    let file = write_file(dir.path(), "call.py", b"foo( a, b )\n");

    assert_eq!(fix(&file), FileStatus::Fixed { iterations: 1 });
    assert_eq!(fs::read(&file).unwrap(), b"foo(a, b )\n");
}

// ---------- Properties ----------

#[test]
fn inserted_lines_use_session_terminator() {
    for (terminator, name) in [("\r\n", "crlf"), ("\n", "lf"), ("\r", "cr")] {
        let dir = temp_dir();
        let content = format!("import os{t}{t}def f():{t}    pass{t}", t = terminator);
        let file = write_file(dir.path(), "mod.py", content.as_bytes());

        assert_eq!(fix(&file), FileStatus::Fixed { iterations: 1 }, "{name}");
        let expected = format!("import os{t}{t}{t}def f():{t}    pass{t}", t = terminator);
        assert_eq!(fs::read_to_string(&file).unwrap(), expected, "{name}");
    }
}

#[test]
fn first_line_decides_terminator_for_mixed_files() {
    let dir = temp_dir();
    let file = write_file(dir.path(), "mod.py", b"import os\r\n\ndef f():\n    pass\n");

    assert_eq!(fix(&file), FileStatus::Fixed { iterations: 1 });
    assert_eq!(
        fs::read(&file).unwrap(),
        b"import os\r\n\n\r\ndef f():\n    pass\n"
    );
}

#[test]
fn fixing_twice_is_idempotent() {
    let dir = temp_dir();
    let file = write_file(
        dir.path(),
        "mod.py",
        b"import os\ndef f( x):\n    return g( y)\n\n\n\n\ndef h():\n    pass\n",
    );

    assert!(matches!(fix(&file), FileStatus::Fixed { .. }));
    let once = fs::read(&file).unwrap();
    assert_eq!(fix(&file), FileStatus::Unchanged);
    assert_eq!(fs::read(&file).unwrap(), once);
}

#[test]
fn converges_in_one_iteration_per_fixable_diagnostic() {
    let dir = temp_dir();
    let file = write_file(
        dir.path(),
        "mod.py",
        b"import os\ndef f( x):\n    return g( y)\n",
    );

    assert_eq!(fix(&file), FileStatus::Fixed { iterations: 3 });
    assert_eq!(
        fs::read(&file).unwrap(),
        b"import os\n\n\ndef f(x):\n    return g(y)\n"
    );
}

#[test]
fn excess_blank_lines_collapse_one_at_a_time() {
    let dir = temp_dir();
    let file = write_file(dir.path(), "mod.py", b"x = 1\n\n\n\n\ndef f():\n    pass\n");

    assert_eq!(fix(&file), FileStatus::Fixed { iterations: 2 });
    assert_eq!(fs::read(&file).unwrap(), b"x = 1\n\n\ndef f():\n    pass\n");
}

#[test]
fn line_count_unchanged_by_character_fixes() {
    let dir = temp_dir();
    let content = b"a = f( 1)\nb = g(  2)\r\nc = h(3)";
    let file = write_file(dir.path(), "mod.py", content);

    assert_eq!(fix(&file), FileStatus::Fixed { iterations: 3 });
    let fixed = fs::read(&file).unwrap();
    assert_eq!(fixed, b"a = f(1)\nb = g(2)\r\nc = h(3)");
    assert_eq!(split_lines(&fixed).len(), split_lines(content).len());
}

// ---------- Multi-file runs ----------

#[test]
fn run_reports_every_file_in_order() {
    let dir = temp_dir();
    let files = vec![
        write_file(dir.path(), "a.py", b"f( 1)\n"),
        write_file(dir.path(), "b.py", b"g(2)\n"),
        write_file(dir.path(), "c.py", b"x = 1\n\n\n\ndef f( ):\n    pass\n"),
    ];

    for parallel in [false, true] {
        let options = FixOptions {
            parallel,
            dry_run: true,
            ..FixOptions::default()
        };
        let report = run_fixer(&files, &MiniStyle, &options);
        let paths: Vec<_> = report.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, files);
        assert_eq!(report.fixed_count(), 2);
        assert_eq!(report.unchanged_count(), 1);
        assert_eq!(report.exit_code(), 0);
    }
    // dry run left everything alone
    assert_eq!(fs::read(&files[0]).unwrap(), b"f( 1)\n");
}

#[test]
fn stuck_file_fails_the_run_but_others_are_fixed() {
    let dir = temp_dir();
    let files = vec![
        write_file(dir.path(), "a.py", b"f( 1)\n"),
        write_file(dir.path(), "b.py", b"\xff\xfe( \n"),
    ];

    let report = run_fixer(&files, &MiniStyle, &FixOptions::default());

    assert_eq!(report.files[0].status, FileStatus::Fixed { iterations: 1 });
    assert!(matches!(report.files[1].status, FileStatus::Stuck { .. }));
    assert_eq!(report.exit_code(), 1);
    assert_eq!(fs::read(&files[0]).unwrap(), b"f(1)\n");
    assert_eq!(fs::read(&files[1]).unwrap(), b"\xff\xfe( \n");
}

// ---------- Real subprocess checker ----------

#[cfg(unix)]
mod subprocess {
    use super::*;
    use hygiene::checker::{CommandChecker, ExternalCommand};
    use std::time::Duration;

    const AWK_CHECKER: &str = r#"exec awk '{ i = index($0, "( "); if (i) { printf "%s:%d:%d: E201 whitespace after (\n", FILENAME, NR, i + 1; bad = 1; exit } } END { exit bad }' "$1"
"#;

    fn script_checker(dir: &Path, body: &str, timeout: Option<Duration>) -> CommandChecker {
        let script = write_file(dir, "checker.sh", body.as_bytes());
        let command = ExternalCommand::parse(&format!("sh {}", script.display()))
            .unwrap()
            .with_timeout(timeout);
        CommandChecker::new(command)
    }

    #[test]
    fn shell_checker_converges() {
        let dir = temp_dir();
        let checker = script_checker(dir.path(), AWK_CHECKER, Some(Duration::from_secs(30)));
        let file = write_file(dir.path(), "src/mod.py", b"f( a)\ng( b)\n");

        let status = fix_file(&file, &checker, &FixOptions::default());

        assert_eq!(status, FileStatus::Fixed { iterations: 2 });
        assert_eq!(fs::read(&file).unwrap(), b"f(a)\ng(b)\n");
    }

    #[test]
    fn hung_checker_is_stuck_not_fatal() {
        let dir = temp_dir();
        let checker = script_checker(
            dir.path(),
            "exec sleep 5\n",
            Some(Duration::from_millis(100)),
        );
        let file = write_file(dir.path(), "src/mod.py", b"f( a)\n");

        let status = fix_file(&file, &checker, &FixOptions::default());

        assert_eq!(
            status,
            FileStatus::Stuck {
                iterations: 0,
                remaining: vec![],
                timed_out: true,
            }
        );
        assert_eq!(fs::read(&file).unwrap(), b"f( a)\n");
    }

    #[test]
    fn crashing_checker_fails_the_file() {
        let dir = temp_dir();
        let checker = script_checker(dir.path(), "echo 'no such option' >&2\nexit 3\n", None);
        let file = write_file(dir.path(), "src/mod.py", b"f( a)\n");

        let FileStatus::Failed { error } = fix_file(&file, &checker, &FixOptions::default()) else {
            panic!("expected failure");
        };
        assert!(error.contains("code 3"), "{error}");
        assert!(error.contains("no such option"), "{error}");
        assert_eq!(fs::read(&file).unwrap(), b"f( a)\n");
    }

    #[test]
    fn fix_command_end_to_end() {
        let dir = temp_dir();
        let script = write_file(dir.path(), "checker.sh", AWK_CHECKER.as_bytes());
        let config = write_file(dir.path(), "hygiene.yml", b"timeout_secs: 30\n");
        let tree = dir.path().join("tree");
        let fixed = write_file(&tree, "pkg/a.py", b"f( a)\n");
        let skipped = write_file(&tree, "vendor/b.py", b"g( b)\n");
        let ignored = write_file(&tree, "notes.txt", b"h( c)\n");

        let checker = format!("sh {}", script.display());
        let args = Args::try_parse_from([
            "hygiene",
            "--config",
            config.to_str().unwrap(),
            "fix",
            tree.to_str().unwrap(),
            "--checker",
            checker.as_str(),
            "--skip",
            "^vendor/",
        ])
        .unwrap();

        assert_eq!(hygiene::run(args).unwrap(), 0);
        assert_eq!(fs::read(&fixed).unwrap(), b"f(a)\n");
        assert_eq!(fs::read(&skipped).unwrap(), b"g( b)\n");
        assert_eq!(fs::read(&ignored).unwrap(), b"h( c)\n");
    }
}

// ---------- Other commands ----------

#[test]
fn lines_command_flags_issues() {
    let dir = temp_dir();
    let config = write_file(dir.path(), "hygiene.yml", b"");
    write_file(dir.path(), "tree/run.sh", b"\techo hi\n");
    let tree = dir.path().join("tree");

    let args = Args::try_parse_from([
        "hygiene",
        "--config",
        config.to_str().unwrap(),
        "lines",
        tree.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(hygiene::run(args).unwrap(), 1);
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = temp_dir();
    let args = Args::try_parse_from([
        "hygiene",
        "--config",
        dir.path().join("absent.yml").to_str().unwrap(),
        "lines",
        dir.path().to_str().unwrap(),
    ])
    .unwrap();
    assert!(hygiene::run(args).is_err());
}

#[test]
fn bad_ratio_threshold_is_an_error() {
    let dir = temp_dir();
    let config = write_file(dir.path(), "hygiene.yml", b"");
    let args = Args::try_parse_from([
        "hygiene",
        "--config",
        config.to_str().unwrap(),
        "ratio",
        dir.path().to_str().unwrap(),
        "--error-threshold",
        "lots",
    ])
    .unwrap();
    assert!(hygiene::run(args).is_err());
}
