//! Domain models for runs, samples and results.

pub mod config;
pub mod phase;
pub mod record;
pub mod run;
pub mod sample;
pub mod variation;

pub use config::{
    ExperimentConfig, LogFormat, LoggingConfig, PipelineConfig, RotationPolicy, SamplingConfig,
    SimulationConfig, ToolStageConfig,
};
pub use phase::{Phase, PhaseTracker};
pub use record::{round3, PowerLogRecord, RunRecord, RunRecordBuilder};
pub use run::{RunContext, RunTiming};
pub use sample::{parse_sample_line, Sample, SampleSeries};
pub use variation::{FactorLevel, RunVariation};
