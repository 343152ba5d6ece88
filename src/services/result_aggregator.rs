//! Turns a run's measurements into its [`RunRecord`].
//!
//! Raw samples are persisted before anything else so they survive a failed
//! aggregation. A record is only produced when every field is available,
//! and only a produced record is appended to the cumulative log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::errors::{RunError, RunResult, ToolPipelineError};
use crate::domain::models::{PowerLogRecord, RunContext, RunRecord, SampleSeries};

/// File name of the per-run raw sample table.
pub const RAW_DATA_FILE: &str = "raw_data.csv";

/// Everything the measurement and post-processing phases handed over.
#[derive(Debug)]
pub struct AggregationInputs {
    pub elapsed: Option<Duration>,
    pub series: SampleSeries,
    pub power_log: PathBuf,
    pub accuracy: Result<String, ToolPipelineError>,
}

/// One row of the raw sample table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSampleRow {
    pub cpu_usage: f64,
    pub mem_usage: f64,
}

#[derive(Debug, Clone)]
pub struct ResultAggregator {
    cumulative_log: PathBuf,
}

impl ResultAggregator {
    pub fn new(cumulative_log: impl Into<PathBuf>) -> Self {
        Self {
            cumulative_log: cumulative_log.into(),
        }
    }

    pub fn cumulative_log(&self) -> &Path {
        &self.cumulative_log
    }

    /// Persist the raw samples, compute the record and log it.
    pub fn aggregate(&self, ctx: &RunContext, inputs: AggregationInputs) -> RunResult<RunRecord> {
        let raw_path = ctx.run_dir().join(RAW_DATA_FILE);
        write_raw_samples(&raw_path, &inputs.series)?;
        debug!(path = %raw_path.display(), samples = inputs.series.len(), "raw samples written");

        let accuracy = inputs.accuracy?;
        let exec_time = inputs
            .elapsed
            .ok_or(RunError::IncompleteRecord("exec_time"))?;
        let no_samples = || RunError::NoValidSamples {
            rejected: inputs.series.rejected().len(),
        };
        let avg_cpu = inputs.series.mean_cpu().ok_or_else(no_samples)?;
        let avg_mem = inputs.series.mean_memory().ok_or_else(no_samples)?;
        let energy = total_cpu_energy(&read_power_log(&inputs.power_log)?);

        let record = RunRecord::builder()
            .exec_time(exec_time.as_secs_f64())
            .avg_cpu(avg_cpu)
            .avg_mem(avg_mem)
            .energy_usage(energy)
            .accuracy(accuracy)
            .build()?;

        self.append_cumulative(ctx, &record)?;
        info!(run_id = %ctx.run_id, ?record, "run record produced");
        Ok(record)
    }

    /// Append `"<log key> => <record json>"` to the cumulative log.
    pub fn append_cumulative(&self, ctx: &RunContext, record: &RunRecord) -> RunResult<()> {
        if let Some(parent) = self.cumulative_log.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| RunError::io(format!("creating {}", parent.display()), e))?;
            }
        }

        let line = format!("{} => {}\n", ctx.log_key(), serde_json::to_string(record)?);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.cumulative_log)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| {
                RunError::io(format!("appending to {}", self.cumulative_log.display()), e)
            })
    }
}

/// Write one row per valid sample, in sampling order.
pub fn write_raw_samples(path: &Path, series: &SampleSeries) -> RunResult<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    if series.is_empty() {
        writer.write_record(["cpu_usage", "mem_usage"])?;
    }
    for sample in series.samples() {
        writer.serialize(RawSampleRow {
            cpu_usage: sample.cpu_percent,
            mem_usage: sample.resident_memory,
        })?;
    }
    writer
        .flush()
        .map_err(|e| RunError::io(format!("flushing {}", path.display()), e))
}

/// Read a table written by [`write_raw_samples`].
pub fn read_raw_samples(path: &Path) -> RunResult<Vec<RawSampleRow>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    reader
        .deserialize()
        .collect::<Result<Vec<RawSampleRow>, _>>()
        .map_err(RunError::from)
}

/// Parse the power sampler's CSV log.
pub fn read_power_log(path: &Path) -> RunResult<Vec<PowerLogRecord>> {
    let power_error = |reason: String| RunError::PowerLog {
        path: path.to_path_buf(),
        reason,
    };

    if !path.exists() {
        return Err(power_error("file not found".to_string()));
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| power_error(e.to_string()))?;

    let records = reader
        .deserialize::<PowerLogRecord>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| power_error(e.to_string()))?;

    if records.is_empty() {
        warn!(path = %path.display(), "power log has no rows");
        return Err(power_error("no power readings".to_string()));
    }
    Ok(records)
}

/// Sum of the `CPU Power` column.
pub fn total_cpu_energy(records: &[PowerLogRecord]) -> f64 {
    records.iter().map(|r| r.cpu_power).sum()
}
