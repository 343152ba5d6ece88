//! Energy Runner - measured execution of molecular-dynamics simulations
//!
//! Each run of an experiment walks a fixed sequence of lifecycle phases:
//! the simulation is prepared and started, sampled for CPU, memory and
//! power while it runs, torn down, and post-processed into one structured
//! record (execution time, average CPU, average memory, energy, accuracy).
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, phase ordering rules, ports and errors
//! - **Application Layer** (`application`): the phase controller and the simulation phases
//! - **Service Layer** (`services`): sampling, post-processing and aggregation
//! - **Infrastructure Layer** (`infrastructure`): processes, signals, config and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use energy_runner::application::{PhaseController, SimulationPhases};
//! use energy_runner::infrastructure::process::CancelToken;
//!
//! let phases = SimulationPhases::new(config, CancelToken::never());
//! let mut controller = PhaseController::new(phases);
//! let record = controller.execute_run(&ctx).await?;
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{PhaseController, RunOutcome, RunState, SimulationPhases};
pub use domain::models::{
    ExperimentConfig, FactorLevel, Phase, PhaseTracker, RunContext, RunRecord, RunVariation,
    Sample, SampleSeries,
};
pub use domain::ports::{MonitorProcess, RunPhases, StopMode};
pub use domain::{ParseError, RunError, RunResult, ToolPipelineError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::process::{cancel_pair, CancelHandle, CancelToken, ProcessSupervisor};
pub use services::{MeasurementSampler, ResultAggregator, ToolPipeline};
