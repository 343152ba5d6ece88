//! Child-process implementation of the monitor port.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use tokio::process::Child;
use tracing::{debug, info, warn};

use super::command::CommandSpec;
use super::signal;
use crate::domain::errors::{RunError, RunResult};
use crate::domain::ports::{MonitorProcess, StopMode};

/// Where a monitor's measurements end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSink {
    /// The monitor's stdout is redirected into the artifact file.
    Stdout,
    /// The monitor writes the artifact itself.
    SelfWritten,
}

/// A monitor running as a child process in its own process group.
pub struct ChildMonitor {
    name: String,
    child: Child,
    pid: u32,
    mode: StopMode,
    artifact: PathBuf,
    grace: Duration,
    stopped: bool,
}

impl ChildMonitor {
    pub fn spawn(
        name: impl Into<String>,
        spec: &CommandSpec,
        mode: StopMode,
        artifact: PathBuf,
        sink: ArtifactSink,
        grace: Duration,
    ) -> RunResult<Self> {
        let name = name.into();
        let command = spec.to_string();

        let stdout = match sink {
            ArtifactSink::Stdout => {
                let file = std::fs::File::create(&artifact).map_err(|e| {
                    RunError::io(format!("creating {}", artifact.display()), e)
                })?;
                Stdio::from(file)
            }
            ArtifactSink::SelfWritten => Stdio::null(),
        };

        let child = spec
            .to_command()
            .stdout(stdout)
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RunError::ProcessSpawn {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        let pid = child.id().ok_or_else(|| RunError::ProcessSpawn {
            command: command.clone(),
            reason: "monitor exited before its pid could be read".to_string(),
        })?;

        info!(monitor = %name, pid, command = %command, "monitor started");

        Ok(Self {
            name,
            child,
            pid,
            mode,
            artifact,
            grace,
            stopped: false,
        })
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    async fn reap(&mut self) -> RunResult<()> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| RunError::io(format!("reaping monitor '{}'", self.name), e))?;
        debug!(monitor = %self.name, %status, "monitor reaped");
        Ok(())
    }

    async fn kill_and_reap(&mut self) -> RunResult<()> {
        if !signal::send(self.pid, Signal::SIGKILL, true)? {
            let _ = self.child.start_kill();
        }
        self.reap().await
    }

    async fn interrupt_and_reap(&mut self) -> RunResult<()> {
        signal::send(self.pid, Signal::SIGINT, false)?;
        match tokio::time::timeout(self.grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(monitor = %self.name, %status, "monitor exited after interrupt");
                Ok(())
            }
            Ok(Err(e)) => Err(RunError::io(format!("reaping monitor '{}'", self.name), e)),
            Err(_) => {
                warn!(
                    monitor = %self.name,
                    grace_ms = u64::try_from(self.grace.as_millis()).unwrap_or(u64::MAX),
                    "monitor ignored interrupt, forcing kill"
                );
                self.kill_and_reap().await
            }
        }
    }
}

#[async_trait]
impl MonitorProcess for ChildMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn stop_mode(&self) -> StopMode {
        self.mode
    }

    fn artifact(&self) -> &Path {
        &self.artifact
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    async fn stop(&mut self) -> RunResult<()> {
        if self.stopped {
            return Ok(());
        }

        let exited = self
            .child
            .try_wait()
            .map_err(|e| RunError::io(format!("polling monitor '{}'", self.name), e))?;
        if exited.is_some() {
            warn!(monitor = %self.name, "monitor exited before it was stopped");
        } else {
            match self.mode {
                StopMode::Kill => self.kill_and_reap().await?,
                StopMode::Interrupt => self.interrupt_and_reap().await?,
            }
        }

        self.stopped = true;
        info!(monitor = %self.name, pid = self.pid, "monitor stopped");
        Ok(())
    }

    async fn read_output(&mut self) -> RunResult<String> {
        if !self.stopped {
            return Err(RunError::SamplerStillRunning(self.name.clone()));
        }
        tokio::fs::read_to_string(&self.artifact)
            .await
            .map_err(|e| RunError::io(format!("reading {}", self.artifact.display()), e))
    }
}

impl Drop for ChildMonitor {
    fn drop(&mut self) {
        if !self.stopped {
            let _ = signal::send(self.pid, Signal::SIGKILL, true);
            let _ = self.child.start_kill();
        }
    }
}
