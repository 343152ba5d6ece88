//! Infrastructure layer module
//!
//! Adapters to the outside world:
//! - Configuration management
//! - Logging infrastructure
//! - Process management (target supervision, monitors, signals)

pub mod config;
pub mod logging;
pub mod process;
