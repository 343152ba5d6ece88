use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration structure for an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExperimentConfig {
    /// Experiment name, used as the results sub-directory
    #[serde(default = "default_name")]
    pub name: String,

    /// Root directory for per-run result directories
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Scratch directory the simulation runs in; wiped before every run
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Append-only log receiving one line per completed run
    #[serde(default = "default_cumulative_log")]
    pub cumulative_log: PathBuf,

    /// Cool-down between consecutive runs
    #[serde(default = "default_time_between_runs_ms")]
    pub time_between_runs_ms: u64,

    /// Upper bound on the target's run time; `None` waits indefinitely
    #[serde(default = "default_target_timeout_secs")]
    pub target_timeout_secs: Option<u64>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulation engine configuration
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Resource and power sampling configuration
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Post-processing tool chain
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_name() -> String {
    "new_runner_experiment".to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("experiments")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("tmp_run_files")
}

fn default_cumulative_log() -> PathBuf {
    PathBuf::from("experiments/backup.txt")
}

const fn default_time_between_runs_ms() -> u64 {
    1000
}

#[allow(clippy::unnecessary_wraps)]
const fn default_target_timeout_secs() -> Option<u64> {
    Some(86_400)
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            results_dir: default_results_dir(),
            scratch_dir: default_scratch_dir(),
            cumulative_log: default_cumulative_log(),
            time_between_runs_ms: default_time_between_runs_ms(),
            target_timeout_secs: default_target_timeout_secs(),
            logging: LoggingConfig::default(),
            simulation: SimulationConfig::default(),
            sampling: SamplingConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Directory holding all run directories of this experiment.
    pub fn experiment_dir(&self) -> PathBuf {
        self.results_dir.join(&self.name)
    }

    pub fn target_timeout(&self) -> Option<Duration> {
        self.target_timeout_secs.map(Duration::from_secs)
    }

    pub const fn time_between_runs(&self) -> Duration {
        Duration::from_millis(self.time_between_runs_ms)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Log file rotation policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Console output format
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for JSON log files (console only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Emit logs to stderr
    #[serde(default = "default_true")]
    pub enable_console: bool,

    /// Rotation policy for log files
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_console: true,
            rotation: RotationPolicy::default(),
        }
    }
}

/// Simulation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimulationConfig {
    /// Engine binary, e.g. `gmx`
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Directory containing `algorithms/<algorithm>_<steps>.mdp`
    #[serde(default = "default_systems_dir")]
    pub systems_dir: PathBuf,

    /// Force field name to prepared system directory
    #[serde(default = "default_force_fields")]
    pub force_fields: BTreeMap<String, PathBuf>,

    /// System used for force fields without an explicit mapping
    #[serde(default = "default_fallback_system")]
    pub fallback_system: Option<PathBuf>,

    /// Solvated structure file inside the system directory
    #[serde(default = "default_structure_file")]
    pub structure_file: String,

    /// Topology file inside the system directory
    #[serde(default = "default_topology_file")]
    pub topology_file: String,

    /// Equilibration checkpoint inside the system directory
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,

    /// Base name for all files written by `mdrun`
    #[serde(default = "default_deffnm")]
    pub deffnm: String,
}

fn default_engine() -> String {
    "gmx".to_string()
}

fn default_systems_dir() -> PathBuf {
    PathBuf::from("systems")
}

fn default_force_fields() -> BTreeMap<String, PathBuf> {
    BTreeMap::from([("allatom".to_string(), PathBuf::from("systems/1ka_aa"))])
}

#[allow(clippy::unnecessary_wraps)]
fn default_fallback_system() -> Option<PathBuf> {
    Some(PathBuf::from("systems/new"))
}

fn default_structure_file() -> String {
    "1AKI_solv_ions.gro".to_string()
}

fn default_topology_file() -> String {
    "topol.top".to_string()
}

fn default_checkpoint_file() -> String {
    "npt.cpt".to_string()
}

fn default_deffnm() -> String {
    "md_0_1".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            systems_dir: default_systems_dir(),
            force_fields: default_force_fields(),
            fallback_system: default_fallback_system(),
            structure_file: default_structure_file(),
            topology_file: default_topology_file(),
            checkpoint_file: default_checkpoint_file(),
            deffnm: default_deffnm(),
        }
    }
}

/// Resource and power sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SamplingConfig {
    /// Delay between target start and the first resource probe
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    /// Delay between consecutive resource probes
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Shell used to run the polling loop
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Probe printing `<cpu%> <rss>` for `{pid}`
    #[serde(default = "default_probe_command")]
    pub probe_command: String,

    /// File in the run directory receiving the probe output
    #[serde(default = "default_samples_file")]
    pub samples_file: String,

    /// Power sampler binary
    #[serde(default = "default_power_program")]
    pub power_program: String,

    /// Power sampler arguments; `{pid}` and `{output}` are substituted
    #[serde(default = "default_power_args")]
    pub power_args: Vec<String>,

    /// Base name of the power log; the sampler appends `-<pid>.csv`
    #[serde(default = "default_power_file")]
    pub power_file: String,

    /// How long an interrupted sampler may take to flush before it is killed
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

const fn default_warmup_ms() -> u64 {
    1000
}

const fn default_interval_ms() -> u64 {
    1000
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_probe_command() -> String {
    "ps -p {pid} --noheader -o %cpu,rss".to_string()
}

fn default_samples_file() -> String {
    "resource_samples.txt".to_string()
}

fn default_power_program() -> String {
    "powerjoular".to_string()
}

fn default_power_args() -> Vec<String> {
    ["-l", "-p", "{pid}", "-f", "{output}"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_power_file() -> String {
    "powerjoular.csv".to_string()
}

const fn default_stop_grace_ms() -> u64 {
    10_000
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            warmup_ms: default_warmup_ms(),
            interval_ms: default_interval_ms(),
            shell: default_shell(),
            probe_command: default_probe_command(),
            samples_file: default_samples_file(),
            power_program: default_power_program(),
            power_args: default_power_args(),
            power_file: default_power_file(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl SamplingConfig {
    pub const fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

/// One post-processing tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolStageConfig {
    /// Stage name used in logs and errors
    pub name: String,

    /// Program to execute; `{engine}` is substituted
    pub program: String,

    /// Arguments; `{engine}` and `{deffnm}` are substituted
    #[serde(default)]
    pub args: Vec<String>,

    /// Text written to the stage's stdin
    #[serde(default)]
    pub stdin: Option<String>,

    /// Artifact (relative to the working directory) that must exist first
    #[serde(default)]
    pub input: Option<String>,

    /// Artifact the stage must produce
    #[serde(default)]
    pub output: Option<String>,
}

/// Post-processing tool chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Token marking the summary line that carries the accuracy value
    #[serde(default = "default_accuracy_marker")]
    pub accuracy_marker: String,

    /// Stages in execution order; the last one's stdout is analysed
    #[serde(default = "default_stages")]
    pub stages: Vec<ToolStageConfig>,
}

fn default_accuracy_marker() -> String {
    "SS1".to_string()
}

const INDEX_SELECTIONS: &str = "1\n0\n";

fn default_stages() -> Vec<ToolStageConfig> {
    let args = |raw: &str| raw.split_whitespace().map(String::from).collect();
    vec![
        ToolStageConfig {
            name: "center".to_string(),
            program: "{engine}".to_string(),
            args: args("trjconv -s {deffnm}.tpr -f {deffnm}.xtc -o {deffnm}_noPBC.xtc -pbc mol -center"),
            stdin: Some(INDEX_SELECTIONS.to_string()),
            input: Some("{deffnm}.xtc".to_string()),
            output: Some("{deffnm}_noPBC.xtc".to_string()),
        },
        ToolStageConfig {
            name: "deviation".to_string(),
            program: "{engine}".to_string(),
            args: args("rms -s {deffnm}.tpr -f {deffnm}_noPBC.xtc -o rmsd.xvg -tu ns"),
            stdin: Some(INDEX_SELECTIONS.to_string()),
            input: Some("{deffnm}_noPBC.xtc".to_string()),
            output: Some("rmsd.xvg".to_string()),
        },
        ToolStageConfig {
            name: "analyze".to_string(),
            program: "{engine}".to_string(),
            args: args("analyze -f rmsd.xvg"),
            stdin: None,
            input: Some("rmsd.xvg".to_string()),
            output: None,
        },
    ]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            accuracy_marker: default_accuracy_marker(),
            stages: default_stages(),
        }
    }
}
