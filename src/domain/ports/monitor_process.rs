//! Monitor port - interface for background measurement processes.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::errors::RunResult;

/// How a monitor is brought down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// SIGKILL; the monitor's output is whatever it wrote so far.
    Kill,
    /// SIGINT so the monitor can flush its output, then wait for it.
    Interrupt,
}

/// A background process sampling the target and writing one artifact.
///
/// The artifact may only be read after [`MonitorProcess::stop`] has
/// returned; implementations reject earlier reads.
#[async_trait]
pub trait MonitorProcess: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    fn stop_mode(&self) -> StopMode;

    /// File the monitor writes its measurements to.
    fn artifact(&self) -> &Path;

    fn is_stopped(&self) -> bool;

    /// Stop the monitor and wait until it has exited. Idempotent.
    async fn stop(&mut self) -> RunResult<()>;

    /// Read the monitor's artifact. Fails while the monitor is running.
    async fn read_output(&mut self) -> RunResult<String>;
}
