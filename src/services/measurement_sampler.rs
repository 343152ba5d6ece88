//! Measurement sampling around a running target.
//!
//! Two monitors observe the target: a polling helper that prints
//! `"<cpu%> <rss>"` once per interval, and a power sampler that writes its
//! own CSV log. Both are started after a warm-up delay and are always
//! stopped before anything they produced is read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::errors::RunResult;
use crate::domain::models::{SampleSeries, SamplingConfig};
use crate::domain::ports::{MonitorProcess, StopMode};
use crate::infrastructure::process::{substitute, ArtifactSink, ChildMonitor, CommandSpec};

/// Starts the monitors for one target.
#[derive(Debug, Clone)]
pub struct MeasurementSampler {
    config: SamplingConfig,
}

impl MeasurementSampler {
    pub fn new(config: SamplingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Wait out the warm-up, then start both monitors against `target_pid`.
    ///
    /// Artifacts are written into `run_dir`. If the power sampler cannot be
    /// started, the already running resource helper is killed on drop.
    pub async fn start(&self, target_pid: u32, run_dir: &Path) -> RunResult<ActiveMeasurement> {
        let warmup = self.config.warmup();
        if !warmup.is_zero() {
            tokio::time::sleep(warmup).await;
        }

        let resource = ChildMonitor::spawn(
            "resource",
            &self.resource_command(target_pid),
            StopMode::Kill,
            run_dir.join(&self.config.samples_file),
            ArtifactSink::Stdout,
            self.config.stop_grace(),
        )?;

        let power_output = run_dir.join(&self.config.power_file);
        let power = ChildMonitor::spawn(
            "power",
            &self.power_command(target_pid, &power_output),
            StopMode::Interrupt,
            self.power_log_path(run_dir, target_pid),
            ArtifactSink::SelfWritten,
            self.config.stop_grace(),
        )?;

        info!(target_pid, run_dir = %run_dir.display(), "measurement started");
        Ok(ActiveMeasurement::new(
            Box::new(resource),
            Box::new(power),
            warmup,
            self.config.interval(),
        ))
    }

    /// Shell loop invoking the probe once per interval.
    pub fn resource_command(&self, target_pid: u32) -> CommandSpec {
        let pid = target_pid.to_string();
        let probe = substitute(&self.config.probe_command, &[("pid", &pid)]);
        let script = format!(
            "while true; do {probe}; sleep {}; done",
            self.config.interval().as_secs_f64()
        );
        CommandSpec::new(&self.config.shell).args(["-c", script.as_str()])
    }

    pub fn power_command(&self, target_pid: u32, output: &Path) -> CommandSpec {
        let pid = target_pid.to_string();
        let output = output.display().to_string();
        CommandSpec::new(&self.config.power_program)
            .args(self.config.power_args.iter().cloned())
            .render(&[("pid", &pid), ("output", &output)])
    }

    /// The power sampler suffixes its output path with the pid it follows.
    pub fn power_log_path(&self, run_dir: &Path, target_pid: u32) -> PathBuf {
        run_dir.join(format!("{}-{target_pid}.csv", self.config.power_file))
    }
}

/// What a finished measurement left behind.
#[derive(Debug, Clone)]
pub struct MeasurementOutput {
    pub series: SampleSeries,
    pub power_log: PathBuf,
}

/// A pair of running monitors, owned until [`ActiveMeasurement::stop`].
pub struct ActiveMeasurement {
    resource: Box<dyn MonitorProcess>,
    power: Box<dyn MonitorProcess>,
    warmup: Duration,
    interval: Duration,
}

impl ActiveMeasurement {
    pub fn new(
        resource: Box<dyn MonitorProcess>,
        power: Box<dyn MonitorProcess>,
        warmup: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            resource,
            power,
            warmup,
            interval,
        }
    }

    /// Stop both monitors, then parse the resource helper's output.
    ///
    /// Both stops are attempted even if the first one fails.
    pub async fn stop(mut self) -> RunResult<MeasurementOutput> {
        let resource_stopped = self.resource.stop().await;
        let power_stopped = self.power.stop().await;
        resource_stopped?;
        power_stopped?;

        let raw = self.resource.read_output().await?;
        let series = SampleSeries::from_output(&raw, self.warmup, self.interval);
        for rejected in series.rejected() {
            warn!(
                line_no = rejected.line_no,
                line = %rejected.line,
                reason = %rejected.reason,
                "discarding malformed sample"
            );
        }

        info!(
            samples = series.len(),
            rejected = series.rejected().len(),
            "measurement stopped"
        );

        Ok(MeasurementOutput {
            series,
            power_log: self.power.artifact().to_path_buf(),
        })
    }
}

impl std::fmt::Debug for ActiveMeasurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveMeasurement")
            .field("resource", &self.resource.name())
            .field("power", &self.power.name())
            .finish_non_exhaustive()
    }
}
