//! Target process supervision.
//!
//! Runs the preparation command to completion, spawns the long-running
//! target, and guarantees the target is reaped: by a natural exit observed
//! in `wait`, by `stop`, or by `Drop` as a last resort.

use std::fs::File;
use std::future;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::command::CommandSpec;
use super::signal;
use crate::domain::errors::{RunError, RunResult};

/// Output of the supervised target, inside its working directory.
pub const TARGET_LOG_FILE: &str = "target.log";

/// Sender half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Receiver half of a cancellation signal; cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// A token that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once cancellation is requested. Never resolves if the
    /// handle is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked cancellation handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationOutcome {
    pub pid: u32,
    pub status: ExitStatus,
    /// `true` when the supervisor killed the process.
    pub forced: bool,
}

struct ProcessHandle {
    child: Child,
    pid: u32,
    outcome: Option<TerminationOutcome>,
    signals_sent: u32,
}

/// Owns exactly one spawned target process.
pub struct ProcessSupervisor {
    label: String,
    handle: ProcessHandle,
}

impl ProcessSupervisor {
    /// Run `prep` to completion in `working_dir`, then spawn `run` there.
    ///
    /// Returns as soon as the target has been spawned.
    pub async fn prepare_and_start(
        prep: &CommandSpec,
        run: &CommandSpec,
        working_dir: &Path,
    ) -> RunResult<Self> {
        run_to_completion(prep, working_dir).await?;
        Self::spawn(run, working_dir)
    }

    /// Spawn `spec` in `working_dir` as a background process.
    ///
    /// Its stdout and stderr go to [`TARGET_LOG_FILE`] in `working_dir`.
    pub fn spawn(spec: &CommandSpec, working_dir: &Path) -> RunResult<Self> {
        let label = spec.to_string();
        let log_path = working_dir.join(TARGET_LOG_FILE);
        let log = File::create(&log_path)
            .map_err(|e| RunError::io(format!("creating {}", log_path.display()), e))?;
        let log_err = log
            .try_clone()
            .map_err(|e| RunError::io(format!("duplicating {}", log_path.display()), e))?;

        let child = spec
            .to_command()
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .spawn()
            .map_err(|e| RunError::ProcessSpawn {
                command: label.clone(),
                reason: e.to_string(),
            })?;

        let pid = child.id().ok_or_else(|| RunError::ProcessSpawn {
            command: label.clone(),
            reason: "process exited before its pid could be read".to_string(),
        })?;

        info!(pid, command = %label, "target started");

        Ok(Self {
            label,
            handle: ProcessHandle {
                child,
                pid,
                outcome: None,
                signals_sent: 0,
            },
        })
    }

    pub const fn pid(&self) -> u32 {
        self.handle.pid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub const fn is_terminated(&self) -> bool {
        self.handle.outcome.is_some()
    }

    pub const fn outcome(&self) -> Option<TerminationOutcome> {
        self.handle.outcome
    }

    /// Number of termination signals this supervisor has delivered.
    pub const fn signals_sent(&self) -> u32 {
        self.handle.signals_sent
    }

    /// Block until the process exits on its own.
    ///
    /// Bounded by `timeout` (when set) and by `cancel`. Neither bound kills
    /// the process; that is left to [`ProcessSupervisor::stop`].
    pub async fn wait(
        &mut self,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> RunResult<TerminationOutcome> {
        if let Some(outcome) = self.handle.outcome {
            return Ok(outcome);
        }

        let pid = self.handle.pid;
        let mut cancel = cancel.clone();
        info!(pid, timeout_secs = timeout.map(|t| t.as_secs()), "waiting for target to exit");

        let status = tokio::select! {
            res = self.handle.child.wait() => {
                res.map_err(|e| RunError::io(format!("waiting on pid {pid}"), e))?
            }
            () = sleep_or_forever(timeout) => {
                warn!(pid, "target exceeded its time bound");
                return Err(RunError::ProcessTimeout {
                    pid,
                    timeout_secs: timeout.map_or(0, |t| t.as_secs()),
                });
            }
            () = cancel.cancelled() => {
                warn!(pid, "wait cancelled");
                return Err(RunError::Cancelled { pid });
            }
        };

        info!(pid, %status, "target exited");
        Ok(self.record(status, false))
    }

    /// Kill the process group and reap the process.
    ///
    /// Idempotent: once the process has been reaped, further calls return
    /// the recorded outcome without signalling anything.
    pub async fn stop(&mut self) -> RunResult<TerminationOutcome> {
        if let Some(outcome) = self.handle.outcome {
            debug!(pid = outcome.pid, "target already stopped");
            return Ok(outcome);
        }

        let pid = self.handle.pid;
        let exited = self
            .handle
            .child
            .try_wait()
            .map_err(|e| RunError::io(format!("polling pid {pid}"), e))?;
        if let Some(status) = exited {
            debug!(pid, %status, "target had already exited");
            return Ok(self.record(status, false));
        }

        info!(pid, "stopping target");
        self.handle.signals_sent += 1;
        if !signal::send(pid, Signal::SIGKILL, true)? {
            self.handle
                .child
                .start_kill()
                .map_err(|e| RunError::Signal {
                    pid,
                    reason: e.to_string(),
                })?;
        }

        let status = self
            .handle
            .child
            .wait()
            .await
            .map_err(|e| RunError::io(format!("reaping pid {pid}"), e))?;

        info!(pid, %status, "target stopped");
        Ok(self.record(status, true))
    }

    fn record(&mut self, status: ExitStatus, forced: bool) -> TerminationOutcome {
        let outcome = TerminationOutcome {
            pid: self.handle.pid,
            status,
            forced,
        };
        self.handle.outcome = Some(outcome);
        outcome
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("label", &self.label)
            .field("pid", &self.handle.pid)
            .field("outcome", &self.handle.outcome)
            .field("signals_sent", &self.handle.signals_sent)
            .finish()
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if self.handle.outcome.is_none() {
            warn!(pid = self.handle.pid, "supervisor dropped with live target, killing it");
            let _ = signal::send(self.handle.pid, Signal::SIGKILL, true);
            let _ = self.handle.child.start_kill();
        }
    }
}

async fn sleep_or_forever(bound: Option<Duration>) {
    match bound {
        Some(duration) => tokio::time::sleep(duration).await,
        None => future::pending::<()>().await,
    }
}

/// Run `spec` in `working_dir` to completion, capturing its output.
///
/// Spawn failure and non-zero exit are both [`RunError::ProcessSpawn`].
pub async fn run_to_completion(spec: &CommandSpec, working_dir: &Path) -> RunResult<Output> {
    let command = spec.to_string();
    debug!(command = %command, dir = %working_dir.display(), "running command to completion");

    let mut child = spec
        .to_command()
        .current_dir(working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RunError::ProcessSpawn {
            command: command.clone(),
            reason: e.to_string(),
        })?;

    if let (Some(input), Some(mut stdin)) = (spec.stdin_input(), child.stdin.take()) {
        stdin
            .write_all(input.as_bytes())
            .await
            .map_err(|e| RunError::io(format!("writing stdin of '{command}'"), e))?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| RunError::io(format!("collecting output of '{command}'"), e))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.is_empty() {
        debug!(command = %command, output = %stdout, "command stdout");
    }
    if !stderr.is_empty() {
        debug!(command = %command, output = %stderr, "command stderr");
    }

    if !output.status.success() {
        return Err(RunError::ProcessSpawn {
            command,
            reason: format!("exited with {}: {}", output.status, stderr.trim()),
        });
    }

    Ok(output)
}
