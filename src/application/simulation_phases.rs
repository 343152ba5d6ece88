//! Phase behaviour for molecular-dynamics runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::domain::errors::{RunError, RunResult};
use crate::domain::models::{ExperimentConfig, Phase, RunContext, RunRecord, RunTiming};
use crate::domain::ports::RunPhases;
use crate::infrastructure::process::{CancelToken, ProcessSupervisor};
use crate::services::{
    ActiveMeasurement, AggregationInputs, MeasurementOutput, MeasurementSampler,
    ResultAggregator, SimulationCommands, ToolPipeline,
};

/// Everything a single run hands from one phase to the next.
#[derive(Debug, Default)]
pub struct RunState {
    pub timing: RunTiming,
    pub target: Option<ProcessSupervisor>,
    pub measurement: Option<ActiveMeasurement>,
    pub output: Option<MeasurementOutput>,
}

pub struct SimulationPhases {
    config: ExperimentConfig,
    sampler: MeasurementSampler,
    aggregator: ResultAggregator,
    cancel: CancelToken,
}

impl SimulationPhases {
    pub fn new(config: ExperimentConfig, cancel: CancelToken) -> Self {
        let sampler = MeasurementSampler::new(config.sampling.clone());
        let aggregator = ResultAggregator::new(&config.cumulative_log);
        Self {
            config,
            sampler,
            aggregator,
            cancel,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    fn scratch_dir(&self) -> &Path {
        &self.config.scratch_dir
    }
}

#[async_trait]
impl RunPhases for SimulationPhases {
    type State = RunState;

    async fn before_experiment(&mut self) -> RunResult<()> {
        for dir in [self.config.experiment_dir(), self.scratch_dir().to_path_buf()] {
            create_dir(&dir).await?;
        }
        info!(
            experiment = %self.config.name,
            dir = %self.config.experiment_dir().display(),
            "experiment prepared"
        );
        Ok(())
    }

    async fn before_run(&mut self) -> RunResult<()> {
        clear_dir(self.scratch_dir()).await
    }

    async fn start_run(&mut self, ctx: &RunContext, state: &mut RunState) -> RunResult<()> {
        create_dir(ctx.run_dir()).await?;
        let commands = SimulationCommands::for_variation(&self.config.simulation, &ctx.variation)?;

        state.timing.mark_started();
        let target =
            ProcessSupervisor::prepare_and_start(&commands.prep, &commands.run, self.scratch_dir())
                .await?;
        state.target = Some(target);
        Ok(())
    }

    async fn start_measurement(&mut self, ctx: &RunContext, state: &mut RunState) -> RunResult<()> {
        let target = state.target.as_ref().ok_or(RunError::MissingState {
            phase: Phase::StartMeasurement,
            missing: "a running target",
        })?;
        let measurement = self.sampler.start(target.pid(), ctx.run_dir()).await?;
        state.measurement = Some(measurement);
        Ok(())
    }

    async fn interact(&mut self, _ctx: &RunContext, state: &mut RunState) -> RunResult<()> {
        let target = state.target.as_mut().ok_or(RunError::MissingState {
            phase: Phase::Interact,
            missing: "a running target",
        })?;
        let outcome = target
            .wait(self.config.target_timeout(), &self.cancel)
            .await?;
        info!(pid = outcome.pid, status = %outcome.status, "simulation finished");
        Ok(())
    }

    async fn stop_measurement(&mut self, _ctx: &RunContext, state: &mut RunState) -> RunResult<()> {
        match state.measurement.take() {
            Some(measurement) => {
                state.output = Some(measurement.stop().await?);
                Ok(())
            }
            None => {
                debug!("no measurement to stop");
                Ok(())
            }
        }
    }

    async fn stop_run(&mut self, _ctx: &RunContext, state: &mut RunState) -> RunResult<()> {
        state.timing.mark_stopped();
        if let Some(target) = state.target.as_mut() {
            target.stop().await?;
        }
        Ok(())
    }

    async fn populate_data(&mut self, ctx: &RunContext, state: &mut RunState) -> RunResult<RunRecord> {
        let output = state.output.take().ok_or(RunError::MissingState {
            phase: Phase::PopulateData,
            missing: "measurement output",
        })?;

        let pipeline = ToolPipeline::from_config(
            &self.config.pipeline,
            &self.config.simulation,
            self.scratch_dir(),
        );
        let accuracy = pipeline.run().await.map(|out| out.accuracy);
        if let Err(err) = &accuracy {
            error!(run_id = %ctx.run_id, error = %err, "tool pipeline failed");
        }

        self.aggregator.aggregate(
            ctx,
            AggregationInputs {
                elapsed: state.timing.elapsed(),
                series: output.series,
                power_log: output.power_log,
                accuracy,
            },
        )
    }

    async fn after_experiment(&mut self) -> RunResult<()> {
        info!(
            experiment = %self.config.name,
            cumulative_log = %self.aggregator.cumulative_log().display(),
            "experiment finished"
        );
        Ok(())
    }
}

async fn create_dir(dir: &Path) -> RunResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RunError::io(format!("creating {}", dir.display()), e))
}

/// Empty `dir`, creating it if needed.
async fn clear_dir(dir: &Path) -> RunResult<()> {
    create_dir(dir).await?;
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| RunError::io(format!("listing {}", dir.display()), e))?;

    let mut removed = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RunError::io(format!("listing {}", dir.display()), e))?
    {
        let path: PathBuf = entry.path();
        let is_dir = entry
            .file_type()
            .await
            .map_err(|e| RunError::io(format!("inspecting {}", path.display()), e))?
            .is_dir();
        let removal = if is_dir {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removal.map_err(|e| RunError::io(format!("removing {}", path.display()), e))?;
        removed += 1;
    }

    debug!(dir = %dir.display(), removed, "scratch directory cleared");
    Ok(())
}
