//! Run lifecycle phases and the ordering rules between them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{RunError, RunResult};

/// A lifecycle phase of the experiment.
///
/// `BeforeExperiment` and `AfterExperiment` bracket the whole experiment;
/// the remaining phases are visited once per run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    BeforeExperiment,
    BeforeRun,
    StartRun,
    StartMeasurement,
    Interact,
    StopMeasurement,
    StopRun,
    PopulateData,
    AfterExperiment,
}

impl Phase {
    /// The per-run phases in the order they must be visited.
    pub const RUN_SEQUENCE: [Self; 7] = [
        Self::BeforeRun,
        Self::StartRun,
        Self::StartMeasurement,
        Self::Interact,
        Self::StopMeasurement,
        Self::StopRun,
        Self::PopulateData,
    ];

    fn run_index(self) -> Option<usize> {
        Self::RUN_SEQUENCE.iter().position(|p| *p == self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::BeforeExperiment => "BeforeExperiment",
            Self::BeforeRun => "BeforeRun",
            Self::StartRun => "StartRun",
            Self::StartMeasurement => "StartMeasurement",
            Self::Interact => "Interact",
            Self::StopMeasurement => "StopMeasurement",
            Self::StopRun => "StopRun",
            Self::PopulateData => "PopulateData",
            Self::AfterExperiment => "AfterExperiment",
        };
        f.write_str(name)
    }
}

/// Tracks the current phase of one run and rejects illegal transitions.
///
/// Normal progress moves exactly one step along [`Phase::RUN_SEQUENCE`].
/// The only permitted jump is the cleanup path: from a failed phase at or
/// after `StartRun` straight to `StopMeasurement` or `StopRun`, never
/// revisiting a phase.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: Phase,
    visited: Vec<Phase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub const fn new() -> Self {
        Self {
            current: Phase::Idle,
            visited: Vec::new(),
        }
    }

    pub const fn current(&self) -> Phase {
        self.current
    }

    /// Phases entered so far, in order.
    pub fn visited(&self) -> &[Phase] {
        &self.visited
    }

    pub fn has_visited(&self, phase: Phase) -> bool {
        self.visited.contains(&phase)
    }

    /// Move to the next phase of the normal sequence.
    pub fn advance(&mut self, to: Phase) -> RunResult<()> {
        let expected = match self.current.run_index() {
            None if self.current == Phase::Idle => Some(Phase::BeforeRun),
            None => None,
            Some(i) => Phase::RUN_SEQUENCE.get(i + 1).copied(),
        };

        if expected != Some(to) || self.has_visited(to) {
            return Err(RunError::PhaseOrder {
                from: self.current,
                to,
            });
        }

        self.enter(to);
        Ok(())
    }

    /// Jump forward to a cleanup phase after a failure.
    pub fn enter_cleanup(&mut self, to: Phase) -> RunResult<()> {
        let allowed = matches!(to, Phase::StopMeasurement | Phase::StopRun)
            && !self.has_visited(to)
            && self.has_visited(Phase::StartRun)
            && to.run_index() > self.current.run_index();

        if !allowed {
            return Err(RunError::PhaseOrder {
                from: self.current,
                to,
            });
        }

        self.enter(to);
        Ok(())
    }

    /// Return to `Idle` once the run is finished, successfully or not.
    pub fn finish(&mut self) {
        self.current = Phase::Idle;
    }

    fn enter(&mut self, phase: Phase) {
        self.current = phase;
        self.visited.push(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_sequence_is_accepted() {
        let mut tracker = PhaseTracker::new();
        for phase in Phase::RUN_SEQUENCE {
            tracker.advance(phase).unwrap();
        }
        assert_eq!(tracker.visited(), &Phase::RUN_SEQUENCE);
        tracker.finish();
        assert_eq!(tracker.current(), Phase::Idle);
    }

    #[test]
    fn test_skipping_a_phase_is_rejected() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(Phase::BeforeRun).unwrap();
        let err = tracker.advance(Phase::StartMeasurement).unwrap_err();
        assert!(matches!(
            err,
            RunError::PhaseOrder {
                from: Phase::BeforeRun,
                to: Phase::StartMeasurement
            }
        ));
    }

    #[test]
    fn test_repeating_a_phase_is_rejected() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(Phase::BeforeRun).unwrap();
        assert!(tracker.advance(Phase::BeforeRun).is_err());
    }

    #[test]
    fn test_cleanup_jump_from_interact() {
        let mut tracker = PhaseTracker::new();
        for phase in &Phase::RUN_SEQUENCE[..4] {
            tracker.advance(*phase).unwrap();
        }
        tracker.enter_cleanup(Phase::StopMeasurement).unwrap();
        tracker.enter_cleanup(Phase::StopRun).unwrap();
        assert!(tracker.enter_cleanup(Phase::StopRun).is_err());
    }

    #[test]
    fn test_cleanup_jump_from_start_run_skips_measurement_phases() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(Phase::BeforeRun).unwrap();
        tracker.advance(Phase::StartRun).unwrap();
        tracker.enter_cleanup(Phase::StopMeasurement).unwrap();
        tracker.enter_cleanup(Phase::StopRun).unwrap();
        assert_eq!(
            tracker.visited(),
            &[
                Phase::BeforeRun,
                Phase::StartRun,
                Phase::StopMeasurement,
                Phase::StopRun
            ]
        );
    }

    #[test]
    fn test_cleanup_not_allowed_before_start_run() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(Phase::BeforeRun).unwrap();
        assert!(tracker.enter_cleanup(Phase::StopRun).is_err());
    }
}
