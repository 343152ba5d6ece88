//! PhaseController - Sequences the lifecycle phases of an experiment
//!
//! Drives a [`RunPhases`] implementation through:
//! - `BeforeExperiment` once, lazily before the first run
//! - the per-run sequence `BeforeRun` .. `PopulateData`, each exactly once
//! - cleanup of the stop phases when a phase at or after `StartRun` fails
//! - `AfterExperiment` once, when the experiment is finished

use std::time::Duration;

use tracing::{error, info, info_span, warn, Instrument};

use crate::domain::errors::{RunError, RunResult};
use crate::domain::models::{Phase, PhaseTracker, RunContext, RunRecord};
use crate::domain::ports::RunPhases;

/// Result of one run within an experiment.
#[derive(Debug)]
pub struct RunOutcome {
    pub context: RunContext,
    pub result: RunResult<RunRecord>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Owns the phase implementation and enforces phase ordering.
pub struct PhaseController<P: RunPhases> {
    phases: P,
    experiment_started: bool,
    experiment_finished: bool,
    last_run: Vec<Phase>,
}

impl<P: RunPhases> PhaseController<P> {
    pub fn new(phases: P) -> Self {
        Self {
            phases,
            experiment_started: false,
            experiment_finished: false,
            last_run: Vec::new(),
        }
    }

    pub fn phases(&self) -> &P {
        &self.phases
    }

    pub fn into_inner(self) -> P {
        self.phases
    }

    /// Phases visited by the most recent run, in order.
    pub fn last_run_phases(&self) -> &[Phase] {
        &self.last_run
    }

    /// Run `BeforeExperiment` unless it already ran.
    pub async fn start_experiment(&mut self) -> RunResult<()> {
        if self.experiment_started {
            return Ok(());
        }
        info!(phase = %Phase::BeforeExperiment, "entering phase");
        self.phases.before_experiment().await?;
        self.experiment_started = true;
        Ok(())
    }

    /// Execute one run through every per-run phase.
    ///
    /// On failure at or after `StartRun`, the stop phases not yet visited
    /// are still executed and the original error is returned. Errors raised
    /// during that cleanup are logged, never returned.
    pub async fn execute_run(&mut self, ctx: &RunContext) -> RunResult<RunRecord> {
        self.start_experiment().await?;

        let span = info_span!("run", run_id = %ctx.run_id, variation = %ctx.variation.label());
        let mut tracker = PhaseTracker::new();
        let mut state = P::State::default();

        let result = self
            .drive(ctx, &mut tracker, &mut state)
            .instrument(span.clone())
            .await;

        let result = match result {
            Ok(record) => Ok(record),
            Err(err) if tracker.has_visited(Phase::StartRun) => {
                warn!(parent: &span, phase = %tracker.current(), error = %err, "run failed, cleaning up");
                self.cleanup(ctx, &mut tracker, &mut state)
                    .instrument(span.clone())
                    .await;
                Err(err)
            }
            Err(err) => {
                warn!(parent: &span, phase = %tracker.current(), error = %err, "run failed before start");
                Err(err)
            }
        };

        tracker.finish();
        self.last_run = tracker.visited().to_vec();
        result
    }

    async fn drive(
        &mut self,
        ctx: &RunContext,
        tracker: &mut PhaseTracker,
        state: &mut P::State,
    ) -> RunResult<RunRecord> {
        enter(tracker, Phase::BeforeRun)?;
        self.phases.before_run().await?;

        enter(tracker, Phase::StartRun)?;
        self.phases.start_run(ctx, state).await?;

        enter(tracker, Phase::StartMeasurement)?;
        self.phases.start_measurement(ctx, state).await?;

        enter(tracker, Phase::Interact)?;
        self.phases.interact(ctx, state).await?;

        enter(tracker, Phase::StopMeasurement)?;
        self.phases.stop_measurement(ctx, state).await?;

        enter(tracker, Phase::StopRun)?;
        self.phases.stop_run(ctx, state).await?;

        enter(tracker, Phase::PopulateData)?;
        self.phases.populate_data(ctx, state).await
    }

    async fn cleanup(&mut self, ctx: &RunContext, tracker: &mut PhaseTracker, state: &mut P::State) {
        for phase in [Phase::StopMeasurement, Phase::StopRun] {
            if tracker.has_visited(phase) {
                continue;
            }
            if let Err(err) = tracker.enter_cleanup(phase) {
                error!(error = %err, "cleanup transition rejected");
                continue;
            }

            info!(phase = %phase, "entering cleanup phase");
            let outcome = match phase {
                Phase::StopMeasurement => self.phases.stop_measurement(ctx, state).await,
                _ => self.phases.stop_run(ctx, state).await,
            };
            if let Err(err) = outcome {
                error!(phase = %phase, error = %err, "cleanup phase failed");
            }
        }
    }

    /// Run every context in order, pausing `cooldown` between runs.
    ///
    /// A failed run is recorded and the experiment continues, except for a
    /// cancellation, which ends it. `AfterExperiment` runs at the end.
    pub async fn run_experiment<I>(
        &mut self,
        contexts: I,
        cooldown: Duration,
    ) -> RunResult<Vec<RunOutcome>>
    where
        I: IntoIterator<Item = RunContext>,
    {
        self.start_experiment().await?;

        let mut outcomes = Vec::new();
        for ctx in contexts {
            if !outcomes.is_empty() && !cooldown.is_zero() {
                tokio::time::sleep(cooldown).await;
            }

            let result = self.execute_run(&ctx).await;
            let cancelled = matches!(result, Err(RunError::Cancelled { .. }));
            match &result {
                Ok(record) => info!(run_id = %ctx.run_id, ?record, "run completed"),
                Err(err) => error!(run_id = %ctx.run_id, error = %err, "run failed"),
            }
            outcomes.push(RunOutcome {
                context: ctx,
                result,
            });

            if cancelled {
                warn!("experiment cancelled, skipping remaining runs");
                break;
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(runs = outcomes.len(), succeeded, "experiment runs finished");

        self.finish_experiment().await?;
        Ok(outcomes)
    }

    /// Run `AfterExperiment` once. A no-op if no run ever started.
    pub async fn finish_experiment(&mut self) -> RunResult<()> {
        if !self.experiment_started || self.experiment_finished {
            return Ok(());
        }
        self.experiment_finished = true;
        info!(phase = %Phase::AfterExperiment, "entering phase");
        self.phases.after_experiment().await
    }
}

fn enter(tracker: &mut PhaseTracker, phase: Phase) -> RunResult<()> {
    tracker.advance(phase)?;
    info!(phase = %phase, "entering phase");
    Ok(())
}
