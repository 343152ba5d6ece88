//! Per-run identity and timing.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::variation::RunVariation;

/// Identifiers of one run, created by the driver and dropped once the
/// run's record has been emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub run_nr: usize,
    pub run_id: String,
    /// Directory holding this run's artifacts (power log, raw samples).
    pub run_dir: PathBuf,
    pub variation: RunVariation,
    pub created_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(run_nr: usize, run_dir: impl Into<PathBuf>, variation: RunVariation) -> Self {
        Self {
            run_nr,
            run_id: format!("run_{run_nr}"),
            run_dir: run_dir.into(),
            variation,
            created_at: Utc::now(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Key used in the cumulative log: `<run_nr>_<level>_<level>...`.
    pub fn log_key(&self) -> String {
        if self.variation.is_empty() {
            self.run_nr.to_string()
        } else {
            format!("{}_{}", self.run_nr, self.variation.label())
        }
    }
}

/// Wall-clock bounds of the target's execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTiming {
    started: Option<Instant>,
    stopped: Option<Instant>,
}

impl RunTiming {
    pub fn mark_started(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Record the stop time; later calls keep the first value.
    pub fn mark_stopped(&mut self) {
        if self.stopped.is_none() {
            self.stopped = Some(Instant::now());
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match (self.started, self.stopped) {
            (Some(start), Some(stop)) => Some(stop.saturating_duration_since(start)),
            _ => None,
        }
    }
}
