//! Spawned extraction tool process

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::error::RelayError;

/// Where the tool's stdout goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdoutMode {
    /// Captured for relaying (pipe downloads)
    Piped,
    /// Discarded (the tool writes to a file)
    Discard,
}

/// How a finished process ended
#[derive(Debug)]
pub struct ProcessOutcome {
    pub status: ExitStatus,
    /// First `ERROR:` line the tool printed, if any
    pub error_line: Option<String>,
}

impl ProcessOutcome {
    /// Whether the run counts as successful. With `strict`, an `ERROR:` line
    /// fails the run even on a zero exit code.
    pub fn succeeded(&self, strict: bool) -> bool {
        self.status.success() && !(strict && self.error_line.is_some())
    }

    /// Convert into a result, mapping failure to `ProcessExecution`
    pub fn into_result(self, strict: bool) -> Result<(), RelayError> {
        if self.succeeded(strict) {
            return Ok(());
        }
        Err(RelayError::ProcessExecution {
            code: self.status.code(),
            detail: self
                .error_line
                .unwrap_or_else(|| format!("exited with {}", self.status)),
        })
    }
}

/// A running extraction tool.
///
/// The child is killed when this handle is dropped, so an abandoned
/// download never leaves the tool running.
pub struct ToolProcess {
    child: Child,
    program: String,
    stderr_task: Option<JoinHandle<Option<String>>>,
}

impl ToolProcess {
    /// Spawn the command, relaying its stderr into the log
    pub fn spawn(mut cmd: Command, program: &str, stdout: StdoutMode) -> Result<Self, RelayError> {
        cmd.stdin(Stdio::null())
            .stdout(match stdout {
                StdoutMode::Piped => Stdio::piped(),
                StdoutMode::Discard => Stdio::null(),
            })
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| {
            error!("Failed to start {}: {}", program, source);
            RelayError::ProcessSpawn {
                program: program.to_string(),
                source,
            }
        })?;
        debug!("Spawned {} (pid {:?})", program, child.id());

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(relay_stderr(stderr, program.to_string())));

        Ok(Self {
            child,
            program: program.to_string(),
            stderr_task,
        })
    }

    /// Take the captured stdout, if piped
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Wait for exit and collect the stderr verdict. Cancel-safe until the child exits.
    pub async fn wait(&mut self) -> Result<ProcessOutcome, RelayError> {
        let status = self.child.wait().await?;
        let error_line = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or(None),
            None => None,
        };
        debug!("{} exited with {}", self.program, status);
        Ok(ProcessOutcome { status, error_line })
    }

    /// Kill the process and reap it
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill {}: {}", self.program, e);
        }
    }
}

async fn relay_stderr(stderr: ChildStderr, program: String) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut first_error = None;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.starts_with("[download]") {
                    trace!("{}: {}", program, line);
                } else if line.starts_with("ERROR:") {
                    error!("{}: {}", program, line);
                    first_error.get_or_insert(line);
                } else {
                    debug!("{}: {}", program, line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading {} stderr: {}", program, e);
                break;
            }
        }
    }

    first_error
}
