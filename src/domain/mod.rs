//! Domain layer for the energy runner
//!
//! Pure data types and rules: run identity, lifecycle phases, samples,
//! result records, configuration and the ports the application drives.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ParseError, RunError, RunResult, ToolPipelineError};
