//! Post-processing tool chain.
//!
//! Runs the configured stages strictly in order inside the scratch
//! directory. Each stage checks that its input artifact exists before it
//! starts and that its output artifact exists after it exits. The first
//! failure stops the chain. The last stage's stdout carries the accuracy
//! value on the line holding the accuracy marker.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::ToolPipelineError;
use crate::domain::models::{PipelineConfig, SimulationConfig};
use crate::infrastructure::process::{substitute, CommandSpec};

/// One external tool invocation with its artifact contract.
#[derive(Debug, Clone)]
pub struct ToolStage {
    pub name: String,
    pub command: CommandSpec,
    /// Must exist (relative to the working directory) before the stage runs.
    pub input: Option<PathBuf>,
    /// Must exist after the stage exits successfully.
    pub output: Option<PathBuf>,
}

/// Outcome of a successful stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub stdout: String,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub accuracy: String,
    pub stages: Vec<StageReport>,
}

pub struct ToolPipeline {
    stages: Vec<ToolStage>,
    accuracy_marker: String,
    working_dir: PathBuf,
}

impl ToolPipeline {
    pub fn new(
        stages: Vec<ToolStage>,
        accuracy_marker: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stages,
            accuracy_marker: accuracy_marker.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Build the chain from configuration, substituting `{engine}` and
    /// `{deffnm}` in programs, arguments and artifact names.
    pub fn from_config(
        pipeline: &PipelineConfig,
        simulation: &SimulationConfig,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        let vars = [
            ("engine", simulation.engine.as_str()),
            ("deffnm", simulation.deffnm.as_str()),
        ];
        let render = |raw: &str| substitute(raw, &vars);

        let stages = pipeline
            .stages
            .iter()
            .map(|stage| {
                let mut command = CommandSpec::new(&stage.program)
                    .args(stage.args.iter().cloned())
                    .render(&vars);
                if let Some(input) = &stage.stdin {
                    command = command.stdin(input.clone());
                }
                ToolStage {
                    name: stage.name.clone(),
                    command,
                    input: stage.input.as_deref().map(|p| PathBuf::from(render(p))),
                    output: stage.output.as_deref().map(|p| PathBuf::from(render(p))),
                }
            })
            .collect();

        Self::new(stages, &pipeline.accuracy_marker, working_dir)
    }

    pub fn stages(&self) -> &[ToolStage] {
        &self.stages
    }

    /// Run every stage in order and extract the accuracy from the last
    /// stage's stdout.
    #[instrument(skip(self), fields(dir = %self.working_dir.display()))]
    pub async fn run(&self) -> Result<PipelineOutput, ToolPipelineError> {
        let mut reports = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            reports.push(self.run_stage(stage).await?);
        }

        let last = reports.last().map(|r| r.stdout.as_str()).unwrap_or_default();
        let accuracy = extract_accuracy(last, &self.accuracy_marker)?;
        info!(accuracy = %accuracy, "tool pipeline finished");

        Ok(PipelineOutput {
            accuracy,
            stages: reports,
        })
    }

    async fn run_stage(&self, stage: &ToolStage) -> Result<StageReport, ToolPipelineError> {
        if let Some(input) = &stage.input {
            let path = self.working_dir.join(input);
            if !exists(&path).await {
                return Err(ToolPipelineError::MissingInput {
                    stage: stage.name.clone(),
                    path,
                });
            }
        }

        debug!(stage = %stage.name, command = %stage.command, "starting stage");
        let started = Instant::now();

        let mut child = stage
            .command
            .to_command()
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolPipelineError::Spawn {
                stage: stage.name.clone(),
                reason: e.to_string(),
            })?;

        if let (Some(input), Some(mut stdin)) = (stage.command.stdin_input(), child.stdin.take()) {
            // A stage may exit without reading its stdin; its exit status decides.
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                warn!(stage = %stage.name, error = %e, "failed to write stage stdin");
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ToolPipelineError::Spawn {
                stage: stage.name.clone(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(ToolPipelineError::StageFailed {
                stage: stage.name.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if let Some(produced) = &stage.output {
            let path = self.working_dir.join(produced);
            if !exists(&path).await {
                return Err(ToolPipelineError::MissingOutput {
                    stage: stage.name.clone(),
                    path,
                });
            }
        }

        let duration = started.elapsed();
        info!(
            stage = %stage.name,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "stage completed"
        );

        Ok(StageReport {
            name: stage.name.clone(),
            stdout,
            duration,
        })
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Return the first token other than `marker` on the first line containing it.
pub fn extract_accuracy(text: &str, marker: &str) -> Result<String, ToolPipelineError> {
    let line = text
        .lines()
        .find(|line| line.contains(marker))
        .ok_or_else(|| ToolPipelineError::MarkerNotFound {
            marker: marker.to_string(),
        })?;

    line.split_whitespace()
        .find(|token| *token != marker)
        .map(str::to_string)
        .ok_or_else(|| ToolPipelineError::AccuracyTokenMissing {
            marker: marker.to_string(),
        })
}
