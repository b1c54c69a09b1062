use std::borrow::Cow;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("failed to execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("'{command}' exited with {status}\nstderr: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("'{command}' output was not valid UTF-8")]
    InvalidOutput { command: String },
}

impl CheckerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CheckerError::TimedOut { .. })
    }
}

/// Result of one external invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// A command template `<program> [args..]`; the target path is appended
/// as the final argument on every run.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ExternalCommand {
    pub fn parse(template: &str) -> Result<Self, CheckerError> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(CheckerError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The command line as it would be run against `target`.
    pub fn display_for(&self, target: &Path) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.push(target.display().to_string());
        parts.join(" ")
    }

    /// Run against `target`, waiting at most the configured timeout.
    pub fn run(&self, target: &Path) -> Result<CommandOutput, CheckerError> {
        let command_line = self.display_for(target);
        debug!(command = %command_line, "running external command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CheckerError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        // Drain both pipes on their own threads so a chatty child never
        // blocks on a full pipe while we wait on it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CheckerError::TimedOut {
                    command: command_line,
                    timeout: self.timeout.unwrap_or_default(),
                });
            }
            Err(source) => {
                let _ = child.kill();
                return Err(CheckerError::Spawn {
                    command: command_line,
                    source,
                });
            }
        };

        Ok(CommandOutput {
            status: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// `Ok(None)` when the deadline passed before the child exited.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> io::Result<Option<std::process::ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Source of diagnostics for one file.
///
/// Implementations return the raw diagnostic stream, one entry per output
/// line; an empty vec means the file is clean.
pub trait Checker: Sync {
    fn check(&self, path: &Path) -> Result<Vec<String>, CheckerError>;
}

/// A style checker run as a subprocess. Exit code 0 (clean) and 1
/// (violations found) are both success; anything else is a failure.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    command: ExternalCommand,
}

impl CommandChecker {
    pub fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl Checker for CommandChecker {
    fn check(&self, path: &Path) -> Result<Vec<String>, CheckerError> {
        let output = self.command.run(path)?;
        match output.status {
            Some(0) | Some(1) => {}
            status => {
                return Err(CheckerError::Failed {
                    command: self.command.display_for(path),
                    status: status.map_or_else(|| "signal".to_string(), |c| format!("code {c}")),
                    stderr: output.stderr_lossy().trim().to_string(),
                });
            }
        }
        let stdout = String::from_utf8(output.stdout).map_err(|_| CheckerError::InvalidOutput {
            command: self.command.display_for(path),
        })?;
        Ok(stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}
