//! Claude Code process spawning and control.
//!
//! A [`ClaudeProcess`] owns one invocation of the Claude Code executable:
//! stdin is closed, stdout is handed to the stream decoder, and stderr is
//! drained in the background (mirrored to tracing in verbose mode).

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::TempPath;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use super::InvocationArgs;
use crate::config::SessionConfig;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Claude binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// The process was started without a stdout pipe.
    #[error("Process stdout not available")]
    NoStdout,
    /// The process ended without an exit code (killed by a signal).
    #[error("Process terminated by signal {signal:?}")]
    Signaled { signal: Option<i32> },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// A running Claude Code process.
#[derive(Debug)]
pub struct ClaudeProcess {
    child: Child,
    /// Kept alive until the process handle is discarded.
    _mcp_config: Option<TempPath>,
}

impl ClaudeProcess {
    /// Spawn Claude Code with prepared invocation arguments.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(config: &SessionConfig, invocation: InvocationArgs) -> Result<Self, SpawnError> {
        let (args, mcp_config) = invocation.into_parts();
        let binary = config.effective_executable();

        let mut cmd = Command::new(binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Apply working directory if set
        if let Some(ref dir) = config.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(SpawnError::from_io)?;
        tracing::debug!(
            binary = %binary.display(),
            pid = ?child.id(),
            args = args.len(),
            "Spawned Claude process"
        );

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, config.verbose));
        }

        Ok(Self {
            child,
            _mcp_config: mcp_config,
        })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// Repeated calls return the same code once the process has exited.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::Signaled` if the process was killed by a signal,
    /// or `SpawnError::Io` if waiting fails.
    pub async fn wait(&mut self) -> Result<i32, SpawnError> {
        let status = self.child.wait().await?;
        exit_code(status)
    }

    /// Send a kill signal without waiting for the process to exit.
    ///
    /// Safe to call repeatedly and after the process has exited.
    pub fn kill(&mut self) {
        match self.child.start_kill() {
            Ok(()) => tracing::debug!(pid = ?self.child.id(), "Sent kill to Claude process"),
            // Already reaped; nothing left to signal.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
            Err(e) => tracing::warn!(error = %e, "Failed to kill Claude process"),
        }
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.child.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            // Process already exited
            return Ok(());
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::debug!(pid, "Graceful termination timed out, killing");
                self.child.kill().await
            }
        }
    }
}

fn exit_code(status: ExitStatus) -> Result<i32, SpawnError> {
    if let Some(code) = status.code() {
        return Ok(code);
    }

    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    Err(SpawnError::Signaled { signal })
}

/// Read stderr to EOF so the child never blocks or gets SIGPIPE.
///
/// Lines are read as bytes; stderr is free-form and may not be UTF-8.
async fn drain_stderr(stderr: ChildStderr, verbose: bool) {
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if verbose {
                    let text = String::from_utf8_lossy(&line);
                    let text = text.trim_end();
                    if !text.is_empty() {
                        tracing::info!(target: "claude_session::stderr", "{text}");
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading Claude stderr");
                break;
            }
        }
    }
}
