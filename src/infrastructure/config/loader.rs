use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::ExperimentConfig;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Experiment name cannot be empty")]
    EmptyName,

    #[error("Invalid sampling interval: {0}ms. Must be at least 1ms")]
    InvalidInterval(u64),

    #[error("Invalid target timeout: {0}s. Must be positive when set")]
    InvalidTimeout(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Simulation engine cannot be empty")]
    EmptyEngine,

    #[error("Probe command must reference {{pid}}: {0}")]
    ProbeWithoutPid(String),

    #[error("Power sampler arguments must reference {{pid}} and {{output}}")]
    PowerArgsIncomplete,

    #[error("Tool pipeline needs at least one stage")]
    EmptyPipeline,

    #[error("Accuracy marker cannot be empty")]
    EmptyAccuracyMarker,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. energy-runner.yaml (experiment config)
    /// 3. energy-runner.local.yaml (machine-local overrides, optional)
    /// 4. Environment variables (ENERGY_RUNNER_* prefix, highest priority)
    pub fn load() -> Result<ExperimentConfig> {
        let config: ExperimentConfig = Self::base()
            .merge(Yaml::file("energy-runner.yaml"))
            .merge(Yaml::file("energy-runner.local.yaml"))
            .merge(Env::prefixed("ENERGY_RUNNER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<ExperimentConfig> {
        let config: ExperimentConfig = Self::base()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("ENERGY_RUNNER_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn base() -> Figment {
        Figment::new().merge(Serialized::defaults(ExperimentConfig::default()))
    }

    /// Validate configuration after loading
    pub fn validate(config: &ExperimentConfig) -> Result<(), ConfigError> {
        if config.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        if config.target_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidTimeout(0));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.simulation.engine.trim().is_empty() {
            return Err(ConfigError::EmptyEngine);
        }

        let sampling = &config.sampling;
        if sampling.interval_ms == 0 {
            return Err(ConfigError::InvalidInterval(sampling.interval_ms));
        }
        if !sampling.probe_command.contains("{pid}") {
            return Err(ConfigError::ProbeWithoutPid(sampling.probe_command.clone()));
        }
        let mentions = |key: &str| sampling.power_args.iter().any(|a| a.contains(key));
        if !mentions("{pid}") || !mentions("{output}") {
            return Err(ConfigError::PowerArgsIncomplete);
        }

        let pipeline = &config.pipeline;
        if pipeline.stages.is_empty() {
            return Err(ConfigError::EmptyPipeline);
        }
        if pipeline.accuracy_marker.trim().is_empty() {
            return Err(ConfigError::EmptyAccuracyMarker);
        }
        for stage in &pipeline.stages {
            if stage.name.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Tool stage name cannot be empty".to_string(),
                ));
            }
            if stage.program.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "Tool stage '{}' program cannot be empty",
                    stage.name
                )));
            }
        }

        Ok(())
    }
}
