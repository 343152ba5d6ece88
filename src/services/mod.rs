pub mod measurement_sampler;
pub mod result_aggregator;
pub mod simulation_commands;
pub mod tool_pipeline;

pub use measurement_sampler::{ActiveMeasurement, MeasurementOutput, MeasurementSampler};
pub use result_aggregator::{AggregationInputs, ResultAggregator, RAW_DATA_FILE};
pub use simulation_commands::SimulationCommands;
pub use tool_pipeline::{extract_accuracy, PipelineOutput, StageReport, ToolPipeline, ToolStage};
