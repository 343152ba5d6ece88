//! Implementation of the `energy-runner run` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::application::{PhaseController, SimulationPhases};
use crate::cli::output::{format_record, output, CommandOutput};
use crate::domain::models::{ExperimentConfig, FactorLevel, RunContext, RunRecord, RunVariation};
use crate::infrastructure::process::CancelToken;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run number, used for the run directory and the cumulative log key
    #[arg(short = 'n', long, default_value = "0")]
    pub run_nr: usize,

    /// Factor level as name=level (force_field, algorithm, md_steps)
    #[arg(short, long = "factor", value_parser = parse_factor)]
    pub factors: Vec<(String, FactorLevel)>,
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub variation: RunVariation,
    pub record: RunRecord,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        format!(
            "{} ({})\n{}",
            self.run_id,
            self.variation.label(),
            format_record(&self.record)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Parse `name=level`.
pub fn parse_factor(raw: &str) -> Result<(String, FactorLevel), String> {
    let (name, level) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=level, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("factor name missing in '{raw}'"));
    }
    Ok((name.to_string(), FactorLevel::parse(level.trim())))
}

pub async fn execute(
    args: RunArgs,
    config: ExperimentConfig,
    cancel: CancelToken,
    json_mode: bool,
) -> Result<()> {
    let variation = RunVariation::new(args.factors);
    let run_dir = config.experiment_dir().join(format!("run_{}", args.run_nr));
    let ctx = RunContext::new(args.run_nr, run_dir, variation);

    let mut controller = PhaseController::new(SimulationPhases::new(config, cancel));
    let result = controller.execute_run(&ctx).await;
    controller
        .finish_experiment()
        .await
        .context("Failed to finish experiment")?;

    let record = result.with_context(|| format!("Run {} failed", ctx.run_id))?;
    output(
        &RunOutput {
            run_id: ctx.run_id.clone(),
            variation: ctx.variation.clone(),
            record,
        },
        json_mode,
    );
    Ok(())
}
