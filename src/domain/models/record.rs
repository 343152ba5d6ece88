//! The structured result of one run and the raw rows it is derived from.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{RunError, RunResult};

/// Round to three decimal places, the precision of every numeric column.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Fixed-schema output of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Wall time between target start and stop, seconds.
    pub exec_time: f64,
    /// Mean CPU utilisation of the target, percent.
    pub avg_cpu: f64,
    /// Mean resident memory of the target, KiB.
    pub avg_mem: f64,
    /// Sum of the power log's CPU power column.
    pub energy_usage: f64,
    /// Accuracy token taken verbatim from the analysis output.
    pub accuracy: String,
}

impl RunRecord {
    /// Output columns in declaration order.
    pub const COLUMNS: [&'static str; 5] =
        ["exec_time", "avg_cpu", "avg_mem", "energy_usage", "accuracy"];

    pub fn builder() -> RunRecordBuilder {
        RunRecordBuilder::default()
    }
}

/// Collects the five fields of a [`RunRecord`]; refuses to build a partial one.
#[derive(Debug, Clone, Default)]
pub struct RunRecordBuilder {
    exec_time: Option<f64>,
    avg_cpu: Option<f64>,
    avg_mem: Option<f64>,
    energy_usage: Option<f64>,
    accuracy: Option<String>,
}

impl RunRecordBuilder {
    #[must_use]
    pub fn exec_time(mut self, secs: f64) -> Self {
        self.exec_time = Some(round3(secs));
        self
    }

    #[must_use]
    pub fn avg_cpu(mut self, value: f64) -> Self {
        self.avg_cpu = Some(round3(value));
        self
    }

    #[must_use]
    pub fn avg_mem(mut self, value: f64) -> Self {
        self.avg_mem = Some(round3(value));
        self
    }

    #[must_use]
    pub fn energy_usage(mut self, value: f64) -> Self {
        self.energy_usage = Some(round3(value));
        self
    }

    #[must_use]
    pub fn accuracy(mut self, value: impl Into<String>) -> Self {
        self.accuracy = Some(value.into());
        self
    }

    pub fn build(self) -> RunResult<RunRecord> {
        Ok(RunRecord {
            exec_time: self.exec_time.ok_or(RunError::IncompleteRecord("exec_time"))?,
            avg_cpu: self.avg_cpu.ok_or(RunError::IncompleteRecord("avg_cpu"))?,
            avg_mem: self.avg_mem.ok_or(RunError::IncompleteRecord("avg_mem"))?,
            energy_usage: self
                .energy_usage
                .ok_or(RunError::IncompleteRecord("energy_usage"))?,
            accuracy: self
                .accuracy
                .ok_or(RunError::IncompleteRecord("accuracy"))?,
        })
    }
}

/// One row of the power sampler's CSV output.
///
/// Only `CPU Power` is consumed; the other columns are kept when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerLogRecord {
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
    #[serde(rename = "CPU Utilization", default)]
    pub cpu_utilization: Option<f64>,
    #[serde(rename = "Total Power", default)]
    pub total_power: Option<f64>,
    #[serde(rename = "CPU Power")]
    pub cpu_power: f64,
}
