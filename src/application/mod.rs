pub mod phase_controller;
pub mod simulation_phases;

pub use phase_controller::{PhaseController, RunOutcome};
pub use simulation_phases::{RunState, SimulationPhases};
