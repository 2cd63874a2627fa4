//! Helpers for running child processes with optional bounded output capture.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

use crate::core::types::{RedirectionMode, TaskExit};

type ReaderHandle = thread::JoinHandle<Result<(Vec<u8>, usize)>>;

/// Output of a finished task. Buffers are empty when output was inherited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub exit: TaskExit,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
}

impl TaskOutput {
    pub fn stdout_truncated_notice(&self, label: &str) -> String {
        if self.stdout_truncated > 0 {
            format!(
                "\n[{label} stdout truncated {} bytes]\n",
                self.stdout_truncated
            )
        } else {
            String::new()
        }
    }

    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }
}

/// A spawned child whose captured pipes are already being drained.
#[derive(Debug)]
pub struct RunningChild {
    child: Child,
    stdout: Option<ReaderHandle>,
    stderr: Option<ReaderHandle>,
}

/// Spawn `cmd`, capturing stdout/stderr when `redirect` is `Capture`.
///
/// Captured pipes are read concurrently from spawn time so a chatty child can
/// never block on a full pipe. `output_limit_bytes` bounds what is kept in
/// memory; bytes beyond it are discarded while the pipe keeps draining.
#[instrument(skip_all, fields(redirect = ?redirect, output_limit_bytes))]
pub fn spawn_child(
    mut cmd: Command,
    redirect: RedirectionMode,
    output_limit_bytes: usize,
) -> Result<RunningChild> {
    match redirect {
        RedirectionMode::Capture => {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        RedirectionMode::Inherit => {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        }
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {:?}", cmd.get_program()));
        }
    };

    let stdout = child
        .stdout
        .take()
        .map(|out| thread::spawn(move || read_stream_limited(out, output_limit_bytes)));
    let stderr = child
        .stderr
        .take()
        .map(|err| thread::spawn(move || read_stream_limited(err, output_limit_bytes)));

    Ok(RunningChild {
        child,
        stdout,
        stderr,
    })
}

impl RunningChild {
    /// Block until the child exits and its captured pipes are drained.
    pub fn wait(mut self) -> Result<TaskOutput> {
        let status = self.child.wait().context("wait for command")?;

        let (stdout, stdout_truncated) = join_output(self.stdout).context("join stdout")?;
        let (stderr, stderr_truncated) = join_output(self.stderr).context("join stderr")?;

        if stdout_truncated > 0 || stderr_truncated > 0 {
            warn!(stdout_truncated, stderr_truncated, "output truncated");
        }

        let exit = exit_from_status(status);
        debug!(exit = ?exit, "command finished");
        Ok(TaskOutput {
            exit,
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
        })
    }
}

#[cfg(unix)]
fn exit_from_status(status: ExitStatus) -> TaskExit {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => TaskExit::Code(code),
        (None, Some(signal)) => TaskExit::Signal(signal),
        (None, None) => TaskExit::Code(1),
    }
}

#[cfg(not(unix))]
fn exit_from_status(status: ExitStatus) -> TaskExit {
    TaskExit::Code(status.code().unwrap_or(1))
}

fn join_output(handle: Option<ReaderHandle>) -> Result<(Vec<u8>, usize)> {
    let Some(handle) = handle else {
        return Ok((Vec::new(), 0));
    };
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
