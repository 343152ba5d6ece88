//! Process management: spawning, supervising and signalling child processes.

pub mod command;
pub mod monitor;
pub mod signal;
pub mod supervisor;

pub use command::{substitute, CommandSpec};
pub use monitor::{ArtifactSink, ChildMonitor};
pub use supervisor::{
    cancel_pair, run_to_completion, CancelHandle, CancelToken, ProcessSupervisor,
    TerminationOutcome, TARGET_LOG_FILE,
};
