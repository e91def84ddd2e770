//! External formatter for modules a move rewrote.
//!
//! Source is piped through `ruff check --fix-only --select I` (import
//! sorting) and then `ruff format`. Each run is bounded by a timeout. A
//! formatter that is missing, fails, or times out never fails the move:
//! [`format_source`] logs a warning and keeps the unformatted text.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::config::FormatterConfig;

/// Errors running the formatter.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The formatter executable is not on `PATH`.
    #[error("formatter '{command}' not found")]
    NotFound { command: String },

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The formatter exited unsuccessfully.
    #[error("{command} exited with {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{command} did not finish within {secs}s")]
    Timeout { command: String, secs: u64 },
}

/// Result type for formatter runs.
pub type FormatResult<T> = Result<T, FormatError>;

/// A resolved formatter executable.
#[derive(Debug, Clone)]
pub struct Formatter {
    executable: PathBuf,
    timeout: Duration,
}

impl Formatter {
    /// Locate the configured command on `PATH`.
    pub fn from_config(config: &FormatterConfig) -> FormatResult<Self> {
        let executable = which::which(&config.command).map_err(|_| FormatError::NotFound {
            command: config.command.clone(),
        })?;
        debug!(executable = %executable.display(), "found formatter");
        Ok(Formatter::with_executable(
            executable,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn with_executable(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Formatter {
            executable: executable.into(),
            timeout,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Sort imports, then format. `path` only tells the formatter which
    /// settings and file type apply; nothing is read from or written to it.
    pub fn format(&self, path: &Path, source: &str) -> FormatResult<String> {
        let filename = path.to_string_lossy();
        let sorted = self.run(
            &[
                "check",
                "--fix-only",
                "--quiet",
                "--select",
                "I",
                "--stdin-filename",
                &filename,
                "-",
            ],
            source,
        )?;
        self.run(&["format", "--stdin-filename", &filename, "-"], &sorted)
    }

    fn run(&self, args: &[&str], input: &str) -> FormatResult<String> {
        let command = format!("{} {}", self.executable.display(), args.join(" "));
        let spawn_error = |source| FormatError::Spawn {
            command: command.clone(),
            source,
        };
        let mut child = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(input.as_bytes()) {
                debug!(error = %err, "formatter closed stdin early");
            }
        }

        match child.wait_timeout(self.timeout).map_err(spawn_error)? {
            Some(status) => {
                let stdout = stdout.join().unwrap_or_default();
                let stderr = stderr.join().unwrap_or_default();
                if status.success() {
                    Ok(stdout)
                } else {
                    Err(FormatError::Failed {
                        command,
                        code: status.code(),
                        stderr: stderr.trim().to_string(),
                    })
                }
            }
            None => {
                kill(&mut child);
                Err(FormatError::Timeout {
                    command,
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// Read a child pipe to the end on a separate thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Format `source`, falling back to it unchanged when the formatter fails.
pub fn format_source(formatter: &Formatter, path: &Path, source: &str) -> String {
    match formatter.format(path, source) {
        Ok(formatted) => formatted,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "formatting failed, keeping unformatted text");
            source.to_string()
        }
    }
}
