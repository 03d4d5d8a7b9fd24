use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ProcessError;

/// Watchdog applied to every external command unless the caller asks for a
/// different bound.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How the child's stdout and stderr are handled.
///
/// `Captured` pipes both streams and returns their contents in
/// [`ProcessOutput`]. `Inherited` passes them straight through to this
/// process's stdio, which suits long engine commands whose progress
/// output is worth watching live; the captured strings are then empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Captured,
    Inherited,
}

/// A fully specified external command invocation.
///
/// Arguments are passed to the OS one argv entry each; nothing is ever
/// routed through a shell. `env: Some(map)` replaces the child environment
/// with exactly `map`, while `None` inherits this process's environment
/// untouched.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Option<HashMap<String, String>>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
    pub output: OutputMode,
}

impl ProcessCommand {
    /// One-line rendering of program and arguments for logs.
    pub fn display_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        shell_words::join(&parts)
    }
}

/// What became of a command that ran to an end state.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Timeout,
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

pub struct TokioProcessRunner;

impl TokioProcessRunner {
    fn configure_command(command: &ProcessCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);

        // A Some(env) is the complete child environment, nothing inherited.
        if let Some(env) = &command.env {
            cmd.env_clear();
            cmd.envs(env);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        match command.output {
            OutputMode::Captured => {
                cmd.stdout(std::process::Stdio::piped());
                cmd.stderr(std::process::Stdio::piped());
            }
            OutputMode::Inherited => {
                cmd.stdout(std::process::Stdio::inherit());
                cmd.stderr(std::process::Stdio::inherit());
            }
        }

        // Commands run headless; none of them may wait on input.
        cmd.stdin(std::process::Stdio::null());
        cmd
    }

    /// Drain a captured stream to a string. Read errors surface as truncated
    /// output; the exit status is what callers act on.
    async fn read_stream<R>(stream: Option<R>) -> String
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        use tokio::io::AsyncReadExt;

        let mut bytes = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut bytes).await;
        }
        String::from_utf8_lossy(&bytes).to_string()
    }

    /// Convert a std ExitStatus to our ExitStatus enum.
    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            ExitStatus::Signal(signal)
        } else {
            ExitStatus::Error(1)
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    fn map_spawn_error(error: std::io::Error, program: &Path) -> ProcessError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(program.display().to_string())
        } else {
            ProcessError::Io(error)
        }
    }

    fn log_start(command: &ProcessCommand) {
        tracing::debug!("exec: {}", command.display_line());
        if let Some(dir) = &command.working_dir {
            tracing::trace!("working directory: {}", dir.display());
        }
        if let Some(env) = &command.env {
            tracing::trace!("replacement environment: {} vars", env.len());
        }
    }

    fn log_result(result: &ProcessOutput, command: &ProcessCommand) {
        match &result.status {
            ExitStatus::Success => {
                tracing::debug!(
                    "completed in {:?}: {}",
                    result.duration,
                    command.display_line()
                );
            }
            ExitStatus::Error(code) => {
                tracing::debug!(
                    "exit code {} after {:?}: {}",
                    code,
                    result.duration,
                    command.display_line()
                );
                if !result.stderr.is_empty() {
                    tracing::trace!("stderr: {}", result.stderr);
                }
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!(
                    "terminated by signal {} after {:?}: {}",
                    signal,
                    result.duration,
                    command.display_line()
                );
            }
            ExitStatus::Timeout => {
                tracing::warn!(
                    "timed out after {:?}: {}",
                    result.duration,
                    command.display_line()
                );
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let start = std::time::Instant::now();
        Self::log_start(&command);

        let mut cmd = Self::configure_command(&command);
        let mut child = cmd
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, &command.program))?;

        // Drain pipes concurrently with the wait so a chatty child can never
        // block on a full pipe buffer.
        let stdout_task = tokio::spawn(Self::read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(Self::read_stream(child.stderr.take()));

        let status = match tokio::time::timeout(command.timeout, child.wait()).await {
            Ok(Ok(status)) => Self::parse_exit_status(status),
            Ok(Err(e)) => return Err(ProcessError::Io(e)),
            Err(_) => {
                // Watchdog fired: the child must not outlive the request.
                if let Err(e) = child.kill().await {
                    tracing::warn!("failed to kill timed out command: {}", e);
                }
                ExitStatus::Timeout
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let result = ProcessOutput {
            status,
            stdout,
            stderr,
            duration: start.elapsed(),
        };
        Self::log_result(&result, &command);
        Ok(result)
    }
}
