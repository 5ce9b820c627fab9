//! Shell command runner.
//!
//! Runs a command through `sh -c` in a fresh process group with stdout and
//! stderr merged into a single pipe, forwards output line by line, and
//! SIGKILLs the whole group once the command finishes, fails, times out, or
//! the calling future is dropped. Descendants that detached into the
//! background are killed with it.

use std::fs::File;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::Bytes;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use super::env::EnvOverlay;
use super::line_reader::{SeparatorReader, DEFAULT_LINE_LIMIT};
use crate::config::ShellConfig;
use crate::{AppError, Result};

/// Default time to wait for output or exit: one hour.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// How long a read may stall once the command has exited before the
/// remaining output is abandoned.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// One line of combined output, as forwarded to the output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// Zero-based position of the line in the command's output.
    pub index: usize,
    /// Decoded line text, including its terminator when one was present.
    pub text: String,
}

/// A command to run with [`exec_command`].
#[derive(Debug)]
pub struct ExecRequest {
    command: String,
    cwd: PathBuf,
    timeout: Duration,
    env: EnvOverlay,
    line_limit: usize,
    output_tx: Option<mpsc::Sender<OutputLine>>,
}

impl ExecRequest {
    /// Run `command` in `cwd` with default settings.
    #[must_use]
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            timeout: DEFAULT_TIMEOUT,
            env: EnvOverlay::new(),
            line_limit: DEFAULT_LINE_LIMIT,
            output_tx: None,
        }
    }

    /// Run `command` in `cwd` with timeout, line limit, and environment
    /// inheritance taken from `config`.
    #[must_use]
    pub fn from_config(
        command: impl Into<String>,
        cwd: impl Into<PathBuf>,
        config: &ShellConfig,
    ) -> Self {
        Self::new(command, cwd)
            .timeout(config.timeout())
            .line_limit(config.line_limit_bytes)
            .env(EnvOverlay::new().inherit(config.inherit_env))
    }

    /// Longest wait for the next output line or for process exit.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Environment overlay applied to the command.
    #[must_use]
    pub fn env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    /// Buffer limit for the line reader before falling back to `\r`.
    #[must_use]
    pub fn line_limit(mut self, limit: usize) -> Self {
        self.line_limit = limit;
        self
    }

    /// Forward each output line to `tx` as it is read.
    ///
    /// The channel is bounded by the caller; a full channel pauses reading
    /// until the consumer catches up.
    #[must_use]
    pub fn output(mut self, tx: mpsc::Sender<OutputLine>) -> Self {
        self.output_tx = Some(tx);
        self
    }

    /// Command text passed to the shell.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Working directory of the command.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}

/// Run a shell command and return its combined output.
///
/// Lines are read with [`SeparatorReader::read_line`], decoded lossily as
/// UTF-8, appended to the returned output, and sent to the request's output
/// channel in order with indices starting at 0. When the process exits its
/// process group is killed and the remaining output is drained until the
/// pipe closes or stays silent for a short grace period.
///
/// Dropping the returned future kills the process group as well.
///
/// # Errors
///
/// - `AppError::CommandExecution` — the command exited with a code above
///   zero; carries the full output.
/// - `AppError::Timeout` — no output line and no exit within the timeout.
/// - `AppError::LineTooLong` — a line exceeded the reader limit.
/// - `AppError::Io` — spawning, reading, waiting, or signalling failed.
pub async fn exec_command(request: ExecRequest) -> Result<String> {
    let exec_id = Uuid::new_v4();
    let span = info_span!("exec_command", %exec_id, cwd = %request.cwd.display());
    run(request).instrument(span).await
}

enum Step {
    Line(Result<Bytes>),
    Exited(std::io::Result<ExitStatus>),
}

async fn run(request: ExecRequest) -> Result<String> {
    let (mut child, pipe) = spawn(&request)?;

    let pid = child
        .id()
        .ok_or_else(|| std::io::Error::other("spawned command has no pid"))?;
    let mut group = ProcessGroup::new(pid)?;
    info!(pid, command = %request.command, "command started");

    let mut reader = SeparatorReader::with_limit(pipe, request.line_limit);
    let mut output_tx = request.output_tx;
    let mut output = String::new();
    let mut index = 0_usize;
    let mut exit: Option<ExitStatus> = None;

    loop {
        // After exit only output that is already on its way is drained. A
        // descendant that left the group may hold the pipe open forever.
        let wait = if exit.is_some() { DRAIN_GRACE } else { request.timeout };
        let step = tokio::time::timeout(wait, async {
            tokio::select! {
                biased;
                line = reader.read_line() => Step::Line(line),
                status = child.wait(), if exit.is_none() => Step::Exited(status),
            }
        })
        .await;

        let step = match step {
            Ok(step) => step,
            Err(_) if exit.is_some() => {
                debug!(
                    grace = ?DRAIN_GRACE,
                    "output still held open by a detached process, not waiting for it"
                );
                break;
            }
            Err(_) => {
                warn!(timeout = ?request.timeout, "command timed out waiting for output");
                return Err(AppError::Timeout(format!(
                    "no output or exit from command within {:?}",
                    request.timeout
                )));
            }
        };

        match step {
            Step::Line(line) => {
                let line = line?;
                if line.is_empty() {
                    break;
                }

                let text = String::from_utf8_lossy(&line).into_owned();
                trace!(index, line = %text.trim_end(), "output line");
                output.push_str(&text);

                let delivered = match &output_tx {
                    Some(tx) => tx.send(OutputLine { index, text }).await.is_ok(),
                    None => true,
                };
                if !delivered {
                    debug!("output receiver dropped, no longer forwarding lines");
                    output_tx = None;
                }
                index += 1;
            }
            Step::Exited(status) => {
                let status = status?;
                debug!(?status, "command exited, killing its process group");
                exit = Some(status);
                group.kill()?;
            }
        }
    }

    // Output closed before the process exited (e.g. it closed its stdout).
    let status = match exit {
        Some(status) => status,
        None => tokio::time::timeout(request.timeout, child.wait())
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "command did not exit within {:?} after closing its output",
                    request.timeout
                ))
            })??,
    };
    group.kill()?;

    match status.code() {
        Some(code) if code > 0 => {
            warn!(exit_code = code, lines = index, "command failed");
            Err(AppError::CommandExecution {
                exit_code: Some(code),
                output,
            })
        }
        code => {
            info!(exit_code = ?code, lines = index, "command finished");
            Ok(output)
        }
    }
}

/// Spawn `sh -c <command>` as the leader of a new process group, with
/// stdout and stderr sharing one pipe.
fn spawn(request: &ExecRequest) -> Result<(Child, pipe::Receiver)> {
    let (read_end, write_end) = std::io::pipe()?;

    let child = {
        let mut cmd = Command::new("sh");
        // Inherited variables pass through untouched, including ones that are
        // not valid Unicode; only the overrides are set explicitly.
        if !request.env.inherits() {
            cmd.env_clear();
        }
        cmd.envs(request.env.resolved_overrides());
        cmd.arg("-c")
            .arg(&request.command)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(write_end.try_clone()?)
            .stderr(write_end)
            .process_group(0)
            .kill_on_drop(true);
        cmd.spawn()?
        // `cmd` drops here, closing the parent's copies of the write end so
        // the reader sees EOF once every process in the group is gone.
    };

    let receiver = pipe::Receiver::from_file(File::from(OwnedFd::from(read_end)))?;
    Ok((child, receiver))
}

/// Process group owned by one execution. Killed on drop unless already killed.
#[derive(Debug)]
struct ProcessGroup {
    pgid: Pid,
    killed: bool,
}

impl ProcessGroup {
    fn new(leader_pid: u32) -> Result<Self> {
        let raw = i32::try_from(leader_pid)
            .map_err(|_| std::io::Error::other(format!("pid {leader_pid} out of range")))?;
        Ok(Self {
            pgid: Pid::from_raw(raw),
            killed: false,
        })
    }

    /// SIGKILL every process in the group. A group that no longer exists is
    /// not an error.
    fn kill(&mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }
        self.killed = true;

        match killpg(self.pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(AppError::Io(std::io::Error::from(errno))),
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.killed {
            return;
        }
        debug!(pgid = %self.pgid, "execution ended early, killing process group");
        if let Err(err) = self.kill() {
            warn!(pgid = %self.pgid, %err, "failed to kill process group");
        }
    }
}
