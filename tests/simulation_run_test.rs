//! Full runs through the simulation phases with a scripted engine.

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use common::temp_dir;
use energy_runner::domain::models::{
    ExperimentConfig, FactorLevel, RunContext, RunVariation, SamplingConfig, SimulationConfig,
};
use energy_runner::services::RAW_DATA_FILE;
use energy_runner::{CancelToken, PhaseController, RunError, SimulationPhases};

const FAKE_ENGINE: &str = r#"#!/bin/sh
cmd=$1; shift
case "$cmd" in
  grompp)
    while [ $# -gt 0 ]; do
      case "$1" in
        -f) case "$2" in *slow_*) touch slow.flag ;; esac ;;
        -o) touch "$2" ;;
      esac
      shift
    done ;;
  mdrun)
    if [ -f slow.flag ]; then sleep 30; else sleep 0.5; fi
    touch md_0_1.xtc ;;
  trjconv) read group; read output; cp md_0_1.xtc md_0_1_noPBC.xtc ;;
  rms) echo "0.0 0.1" > rmsd.xvg ;;
  analyze) echo "Statistics"; echo "SS1    0.452    0.011" ;;
  *) exit 1 ;;
esac
"#;

fn install_engine(dir: &Path) -> String {
    let path = dir.join("fake-gmx");
    std::fs::write(&path, FAKE_ENGINE).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

fn config(root: &Path) -> ExperimentConfig {
    ExperimentConfig {
        name: "e2e".to_string(),
        results_dir: root.join("experiments"),
        scratch_dir: root.join("tmp_run_files"),
        cumulative_log: root.join("experiments").join("backup.txt"),
        time_between_runs_ms: 0,
        target_timeout_secs: Some(1),
        simulation: SimulationConfig {
            engine: install_engine(root),
            ..Default::default()
        },
        sampling: SamplingConfig {
            warmup_ms: 0,
            interval_ms: 100,
            probe_command: "echo 10.0 2048; : {pid}".to_string(),
            power_program: "sh".to_string(),
            power_args: vec![
                "-c".to_string(),
                "out={output}-{pid}.csv; trap 'exit 0' INT; echo 'Date,CPU Power' > $out; \
                 while true; do echo '2024-01-01 10:00:00,2.0' >> $out; sleep 0.1; done"
                    .to_string(),
            ],
            stop_grace_ms: 2000,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn variation(force_field: &str, algorithm: &str) -> RunVariation {
    RunVariation::new([
        ("force_field", FactorLevel::from(force_field)),
        ("algorithm", FactorLevel::from(algorithm)),
        ("md_steps", FactorLevel::Integer(50_000)),
    ])
}

fn run_context(config: &ExperimentConfig, run_nr: usize, variation: RunVariation) -> RunContext {
    RunContext::new(
        run_nr,
        config.experiment_dir().join(format!("run_{run_nr}")),
        variation,
    )
}

#[tokio::test]
async fn test_successful_run_produces_record() {
    common::setup_test_logging();
    let root = temp_dir();
    let config = config(root.path());
    let cumulative = config.cumulative_log.clone();
    let ctx = run_context(&config, 0, variation("allatom", "md"));

    let mut controller = PhaseController::new(SimulationPhases::new(config, CancelToken::never()));
    let record = controller.execute_run(&ctx).await.unwrap();
    controller.finish_experiment().await.unwrap();

    assert_eq!(record.accuracy, "0.452");
    assert!((record.avg_cpu - 10.0).abs() < 1e-9);
    assert!((record.avg_mem - 2048.0).abs() < 1e-9);
    assert!(record.exec_time >= 0.5);
    assert!(record.energy_usage >= 2.0);

    assert!(ctx.run_dir().join(RAW_DATA_FILE).exists());
    let log = std::fs::read_to_string(cumulative).unwrap();
    assert!(log.starts_with("0_allatom_md_50000 => {"));
}

#[tokio::test]
async fn test_timed_out_run_is_cleaned_up_without_record() {
    let root = temp_dir();
    let config = config(root.path());
    let cumulative = config.cumulative_log.clone();
    let ctx = run_context(&config, 0, variation("allatom", "slow"));

    let mut controller = PhaseController::new(SimulationPhases::new(config, CancelToken::never()));
    let err = controller.execute_run(&ctx).await.unwrap_err();

    assert!(matches!(err, RunError::ProcessTimeout { timeout_secs: 1, .. }));
    assert!(!cumulative.exists());
    assert!(!ctx.run_dir().join(RAW_DATA_FILE).exists());
}

#[tokio::test]
async fn test_unknown_force_field_fails_before_spawning() {
    let root = temp_dir();
    let mut config = config(root.path());
    config.simulation.fallback_system = None;
    let ctx = run_context(&config, 0, variation("amber", "md"));

    let mut controller = PhaseController::new(SimulationPhases::new(config, CancelToken::never()));
    let err = controller.execute_run(&ctx).await.unwrap_err();

    assert!(matches!(err, RunError::UnknownForceField(ff) if ff == "amber"));
}

#[tokio::test]
async fn test_experiment_runs_every_variation() {
    let root = temp_dir();
    let config = config(root.path());
    let cumulative = config.cumulative_log.clone();
    let contexts = vec![
        run_context(&config, 0, variation("allatom", "md")),
        run_context(&config, 1, variation("charmm", "sd")),
    ];

    let mut controller = PhaseController::new(SimulationPhases::new(config, CancelToken::never()));
    let outcomes = controller
        .run_experiment(contexts, std::time::Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.is_success()));
    let log = std::fs::read_to_string(cumulative).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert!(log.lines().nth(1).unwrap().starts_with("1_charmm_sd_50000 => "));
}

#[tokio::test]
async fn test_relative_scratch_dir_resolves_against_working_dir() {
    let cwd = std::env::current_dir().unwrap();
    let local = tempfile::tempdir_in(&cwd).unwrap();
    let relative = local.path().strip_prefix(&cwd).unwrap().to_path_buf();

    let mut config = config(local.path());
    config.scratch_dir = relative.join("tmp_run_files");
    config.simulation.systems_dir = relative.join("systems");
    let ctx = run_context(&config, 0, variation("allatom", "md"));

    let mut controller = PhaseController::new(SimulationPhases::new(config, CancelToken::never()));
    let record = controller.execute_run(&ctx).await.unwrap();

    assert_eq!(record.accuracy, "0.452");
    assert!(local.path().join("tmp_run_files").join("md_0_1.tpr").exists());
}
