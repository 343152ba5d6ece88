//! Run phases port - the per-phase behaviour the controller sequences.

use async_trait::async_trait;

use crate::domain::errors::RunResult;
use crate::domain::models::{RunContext, RunRecord};

/// Behaviour of every lifecycle phase of an experiment.
///
/// The controller owns the ordering; implementations only do the work of
/// each phase. Per-run state lives in `Self::State`, created fresh for
/// every run and passed explicitly to each phase that needs it.
#[async_trait]
pub trait RunPhases: Send {
    type State: Default + Send;

    /// Invoked once, before the first run.
    async fn before_experiment(&mut self) -> RunResult<()>;

    /// Workspace reset before a run; must not touch processes.
    async fn before_run(&mut self) -> RunResult<()>;

    async fn start_run(&mut self, ctx: &RunContext, state: &mut Self::State) -> RunResult<()>;

    async fn start_measurement(
        &mut self,
        ctx: &RunContext,
        state: &mut Self::State,
    ) -> RunResult<()>;

    /// Block until the target is done.
    async fn interact(&mut self, ctx: &RunContext, state: &mut Self::State) -> RunResult<()>;

    /// Must tolerate a state in which measurement never started.
    async fn stop_measurement(
        &mut self,
        ctx: &RunContext,
        state: &mut Self::State,
    ) -> RunResult<()>;

    /// Must tolerate a state in which the target never started.
    async fn stop_run(&mut self, ctx: &RunContext, state: &mut Self::State) -> RunResult<()>;

    async fn populate_data(
        &mut self,
        ctx: &RunContext,
        state: &mut Self::State,
    ) -> RunResult<RunRecord>;

    /// Invoked once, after the last run.
    async fn after_experiment(&mut self) -> RunResult<()>;
}
