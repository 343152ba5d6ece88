//! Resource samples collected from the target process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::ParseError;

/// One observation of the target's CPU share and resident memory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Nominal time since measurement started (warm-up + index * interval).
    #[serde(with = "duration_secs")]
    pub offset: Duration,
    /// CPU utilisation as reported by `ps` (`%cpu`).
    pub cpu_percent: f64,
    /// Resident set size as reported by `ps` (`rss`, KiB).
    pub resident_memory: f64,
}

/// Parse one `"<cpu%> <rss>"` line emitted by the polling helper.
pub fn parse_sample_line(
    line_no: usize,
    line: &str,
    offset: Duration,
) -> Result<Sample, ParseError> {
    let reject = |reason: String| ParseError {
        line_no,
        line: line.to_string(),
        reason,
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(reject(format!("expected 2 fields, found {}", fields.len())));
    }

    let cpu_percent = parse_finite(fields[0])
        .ok_or_else(|| reject(format!("cpu_percent {:?} is not a number", fields[0])))?;
    let resident_memory = parse_finite(fields[1])
        .ok_or_else(|| reject(format!("resident_memory {:?} is not a number", fields[1])))?;

    Ok(Sample {
        offset,
        cpu_percent,
        resident_memory,
    })
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Ordered, append-only series of samples for one run.
///
/// Lines that fail to parse are kept as [`ParseError`]s instead of aborting
/// the series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    samples: Vec<Sample>,
    rejected: Vec<ParseError>,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from raw helper output.
    ///
    /// Blank lines are ignored. Offsets are assigned from the line position
    /// among non-blank lines, so a rejected line still consumes its slot.
    pub fn from_output(output: &str, warmup: Duration, interval: Duration) -> Self {
        let mut series = Self::new();
        let lines = output.lines().filter(|l| !l.trim().is_empty());
        for (idx, line) in lines.enumerate() {
            let slot = u32::try_from(idx).unwrap_or(u32::MAX);
            let offset = warmup + interval.saturating_mul(slot);
            match parse_sample_line(idx + 1, line, offset) {
                Ok(sample) => series.push(sample),
                Err(err) => series.reject(err),
            }
        }
        series
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn reject(&mut self, err: ParseError) {
        self.rejected.push(err);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn rejected(&self) -> &[ParseError] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Arithmetic mean of `cpu_percent` over valid samples.
    pub fn mean_cpu(&self) -> Option<f64> {
        self.mean_of(|s| s.cpu_percent)
    }

    /// Arithmetic mean of `resident_memory` over valid samples.
    pub fn mean_memory(&self) -> Option<f64> {
        self.mean_of(|s| s.resident_memory)
    }

    fn mean_of(&self, field: impl Fn(&Sample) -> f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().map(field).sum();
        Some(total / self.samples.len() as f64)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
