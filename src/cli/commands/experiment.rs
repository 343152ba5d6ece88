//! Implementation of the `energy-runner experiment` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::application::{PhaseController, RunOutcome, SimulationPhases};
use crate::cli::output::{format_record, output, CommandOutput};
use crate::domain::models::{ExperimentConfig, RunContext, RunRecord, RunVariation};
use crate::infrastructure::process::CancelToken;

#[derive(Args, Debug)]
pub struct ExperimentArgs {
    /// YAML file holding a list of variations, one mapping of factor levels each
    #[arg(short, long)]
    pub variations: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub variation: RunVariation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RunRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<RunOutcome> for RunSummary {
    fn from(outcome: RunOutcome) -> Self {
        let (record, error) = match outcome.result {
            Ok(record) => (Some(record), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            run_id: outcome.context.run_id,
            variation: outcome.context.variation,
            record,
            error,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ExperimentOutput {
    pub experiment: String,
    pub planned: usize,
    pub runs: Vec<RunSummary>,
}

impl ExperimentOutput {
    pub fn failed(&self) -> usize {
        self.runs.iter().filter(|r| r.error.is_some()).count()
    }
}

impl CommandOutput for ExperimentOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Experiment '{}': {} of {} runs executed, {} failed",
            self.experiment,
            self.runs.len(),
            self.planned,
            self.failed()
        )];
        for run in &self.runs {
            lines.push(format!("\n{} ({})", run.run_id, run.variation.label()));
            match (&run.record, &run.error) {
                (Some(record), _) => lines.push(format_record(record)),
                (None, Some(error)) => lines.push(format!("  failed: {error}")),
                (None, None) => {}
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Read a YAML list of variations.
pub fn load_variations(path: &Path) -> Result<Vec<RunVariation>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read variations from {}", path.display()))?;
    let variations: Vec<RunVariation> = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse variations in {}", path.display()))?;
    if variations.is_empty() {
        anyhow::bail!("No variations in {}", path.display());
    }
    Ok(variations)
}

pub async fn execute(
    args: ExperimentArgs,
    config: ExperimentConfig,
    cancel: CancelToken,
    json_mode: bool,
) -> Result<()> {
    let variations = load_variations(&args.variations)?;
    let experiment_dir = config.experiment_dir();
    let contexts: Vec<RunContext> = variations
        .into_iter()
        .enumerate()
        .map(|(run_nr, variation)| {
            RunContext::new(run_nr, experiment_dir.join(format!("run_{run_nr}")), variation)
        })
        .collect();

    let planned = contexts.len();
    let experiment = config.name.clone();
    let cooldown = config.time_between_runs();

    let mut controller = PhaseController::new(SimulationPhases::new(config, cancel));
    let outcomes = controller
        .run_experiment(contexts, cooldown)
        .await
        .context("Experiment aborted")?;

    let result = ExperimentOutput {
        experiment,
        planned,
        runs: outcomes.into_iter().map(RunSummary::from).collect(),
    };
    output(&result, json_mode);

    let failed = result.failed();
    if failed > 0 {
        anyhow::bail!("{failed} of {planned} runs failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FactorLevel;

    #[test]
    fn test_load_variations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variations.yaml");
        std::fs::write(
            &path,
            "- force_field: allatom\n  algorithm: md\n  md_steps: 50000\n\
             - force_field: charmm\n  algorithm: sd\n  md_steps: 250000\n",
        )
        .unwrap();

        let variations = load_variations(&path).unwrap();
        assert_eq!(variations.len(), 2);
        assert_eq!(variations[1].label(), "charmm_sd_250000");
        assert_eq!(
            variations[0].get("md_steps"),
            Some(&FactorLevel::Integer(50_000))
        );
    }

    #[test]
    fn test_load_variations_rejects_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variations.yaml");
        std::fs::write(&path, "[]\n").unwrap();
        assert!(load_variations(&path).is_err());
    }
}
