//! Domain errors for the energy runner.

use std::path::PathBuf;

use thiserror::Error;

use super::models::phase::Phase;

/// A single resource-sample line that could not be parsed.
///
/// Recovered locally by the sampler: the line is skipped and counted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed sample line {line_no}: {reason} ({line:?})")]
pub struct ParseError {
    /// 1-based position of the line in the sampler output.
    pub line_no: usize,
    /// The raw line as emitted by the helper.
    pub line: String,
    /// What was wrong with it.
    pub reason: String,
}

/// Failures of the post-processing tool chain.
#[derive(Debug, Error)]
pub enum ToolPipelineError {
    #[error("Stage '{stage}' could not start: input artifact {} is missing", path.display())]
    MissingInput { stage: String, path: PathBuf },

    #[error("Stage '{stage}' failed to spawn: {reason}")]
    Spawn { stage: String, reason: String },

    #[error("Stage '{stage}' exited with {status}: {stderr}")]
    StageFailed {
        stage: String,
        status: String,
        stderr: String,
    },

    #[error("Stage '{stage}' did not produce {}", path.display())]
    MissingOutput { stage: String, path: PathBuf },

    #[error("No line containing accuracy marker '{marker}' in analysis output")]
    MarkerNotFound { marker: String },

    #[error("Accuracy marker '{marker}' found but no value follows it")]
    AccuracyTokenMissing { marker: String },
}

/// Top-level error for a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to spawn '{command}': {reason}")]
    ProcessSpawn { command: String, reason: String },

    #[error("Process {pid} did not exit within {timeout_secs}s")]
    ProcessTimeout { pid: u32, timeout_secs: u64 },

    #[error("Wait on process {pid} was cancelled")]
    Cancelled { pid: u32 },

    #[error("Failed to signal process {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Tool pipeline failed: {0}")]
    ToolPipeline(#[from] ToolPipelineError),

    #[error("Invalid phase transition from {from} to {to}")]
    PhaseOrder { from: Phase, to: Phase },

    #[error("Phase {phase} requires {missing}, which no earlier phase produced")]
    MissingState { phase: Phase, missing: &'static str },

    #[error("Sampler '{0}' output requested before it was stopped")]
    SamplerStillRunning(String),

    #[error("No valid resource samples were collected ({rejected} lines rejected)")]
    NoValidSamples { rejected: usize },

    #[error("Run record is missing '{0}'")]
    IncompleteRecord(&'static str),

    #[error("Power log {}: {reason}", path.display())]
    PowerLog { path: PathBuf, reason: String },

    #[error("Unknown force field '{0}'")]
    UnknownForceField(String),

    #[error("Missing factor '{0}' in run variation")]
    MissingFactor(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RunError {
    /// Wrap an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type RunResult<T> = Result<T, RunError>;
