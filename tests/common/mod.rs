//! Common test utilities for integration tests
//!
//! Provides fake ports and fixtures shared across integration test files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use energy_runner::domain::models::{Phase, RunContext, RunRecord, RunVariation};
use energy_runner::domain::ports::{MonitorProcess, RunPhases, StopMode};
use energy_runner::{RunError, RunResult};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn context(run_nr: usize, root: &Path) -> RunContext {
    RunContext::new(
        run_nr,
        root.join(format!("run_{run_nr}")),
        RunVariation::new([("force_field", "allatom"), ("algorithm", "md")]),
    )
}

pub fn sample_record() -> RunRecord {
    RunRecord {
        exec_time: 1.5,
        avg_cpu: 13.467,
        avg_mem: 2000.0,
        energy_usage: 21.75,
        accuracy: "0.452".to_string(),
    }
}

/// Shared, ordered log of what the fakes observed.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Monitor fake that records stops and reads and enforces stop-before-read.
pub struct FakeMonitor {
    name: String,
    artifact: PathBuf,
    output: String,
    stopped: bool,
    fail_stop: bool,
    log: EventLog,
}

impl FakeMonitor {
    pub fn new(name: &str, output: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            artifact: PathBuf::from(format!("/fake/{name}.out")),
            output: output.to_string(),
            stopped: false,
            fail_stop: false,
            log: log.clone(),
        }
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }
}

#[async_trait]
impl MonitorProcess for FakeMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn stop_mode(&self) -> StopMode {
        StopMode::Kill
    }

    fn artifact(&self) -> &Path {
        &self.artifact
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    async fn stop(&mut self) -> RunResult<()> {
        self.log.push(format!("stop:{}", self.name));
        if self.fail_stop {
            return Err(RunError::Signal {
                pid: 0,
                reason: format!("{} refused to stop", self.name),
            });
        }
        self.stopped = true;
        Ok(())
    }

    async fn read_output(&mut self) -> RunResult<String> {
        self.log.push(format!("read:{}", self.name));
        if !self.stopped {
            return Err(RunError::SamplerStillRunning(self.name.clone()));
        }
        Ok(self.output.clone())
    }
}

/// A phase that should fail on a given run.
#[derive(Debug, Clone, Copy)]
pub struct Failure {
    pub run: usize,
    pub phase: Phase,
    pub cancelled: bool,
}

impl Failure {
    pub fn at(run: usize, phase: Phase) -> Self {
        Self {
            run,
            phase,
            cancelled: false,
        }
    }

    pub fn cancelled(run: usize, phase: Phase) -> Self {
        Self {
            run,
            phase,
            cancelled: true,
        }
    }
}

/// Phase fake that records every phase it is asked to run.
#[derive(Debug, Default)]
pub struct RecordingPhases {
    pub visited: Arc<Mutex<Vec<Phase>>>,
    failures: Vec<Failure>,
    runs: usize,
}

impl RecordingPhases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: impl IntoIterator<Item = Failure>) -> Self {
        Self {
            failures: failures.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn visited(&self) -> Vec<Phase> {
        self.visited.lock().unwrap().clone()
    }

    fn visit(&self, phase: Phase) -> RunResult<()> {
        self.visited.lock().unwrap().push(phase);
        let run = self.runs.saturating_sub(1);
        match self
            .failures
            .iter()
            .find(|f| f.run == run && f.phase == phase)
        {
            Some(f) if f.cancelled => Err(RunError::Cancelled { pid: 42 }),
            Some(_) => Err(RunError::ProcessTimeout {
                pid: 42,
                timeout_secs: 1,
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingState {
    pub started: bool,
}

#[async_trait]
impl RunPhases for RecordingPhases {
    type State = RecordingState;

    async fn before_experiment(&mut self) -> RunResult<()> {
        self.visit(Phase::BeforeExperiment)
    }

    async fn before_run(&mut self) -> RunResult<()> {
        self.runs += 1;
        self.visit(Phase::BeforeRun)
    }

    async fn start_run(&mut self, _ctx: &RunContext, state: &mut RecordingState) -> RunResult<()> {
        self.visit(Phase::StartRun)?;
        state.started = true;
        Ok(())
    }

    async fn start_measurement(
        &mut self,
        _ctx: &RunContext,
        _state: &mut RecordingState,
    ) -> RunResult<()> {
        self.visit(Phase::StartMeasurement)
    }

    async fn interact(&mut self, _ctx: &RunContext, _state: &mut RecordingState) -> RunResult<()> {
        self.visit(Phase::Interact)
    }

    async fn stop_measurement(
        &mut self,
        _ctx: &RunContext,
        _state: &mut RecordingState,
    ) -> RunResult<()> {
        self.visit(Phase::StopMeasurement)
    }

    async fn stop_run(&mut self, _ctx: &RunContext, state: &mut RecordingState) -> RunResult<()> {
        self.visit(Phase::StopRun)?;
        state.started = false;
        Ok(())
    }

    async fn populate_data(
        &mut self,
        _ctx: &RunContext,
        _state: &mut RecordingState,
    ) -> RunResult<RunRecord> {
        self.visit(Phase::PopulateData)?;
        Ok(sample_record())
    }

    async fn after_experiment(&mut self) -> RunResult<()> {
        self.visit(Phase::AfterExperiment)
    }
}
