//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::experiment::ExperimentArgs;
use super::commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "energy-runner")]
#[command(about = "Measure execution time, resource use and energy of simulation runs", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to energy-runner.yaml and energy-runner.local.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a single measured run
    Run(RunArgs),

    /// Execute every variation of a variations file in order
    Experiment(ExperimentArgs),
}
