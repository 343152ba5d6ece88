//! Port traits (hexagonal architecture interfaces)

pub mod monitor_process;
pub mod run_phases;

pub use monitor_process::{MonitorProcess, StopMode};
pub use run_phases::RunPhases;
