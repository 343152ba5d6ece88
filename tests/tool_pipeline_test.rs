//! Tool chain ordering, artifact checks and accuracy extraction.

mod common;

use std::path::PathBuf;

use common::temp_dir;
use energy_runner::infrastructure::process::CommandSpec;
use energy_runner::services::{ToolPipeline, ToolStage};
use energy_runner::ToolPipelineError;

fn stage(name: &str, script: &str) -> ToolStage {
    ToolStage {
        name: name.to_string(),
        command: CommandSpec::new("sh").args(["-c", script]),
        input: None,
        output: None,
    }
}

#[tokio::test]
async fn test_stages_chain_artifacts_and_yield_accuracy() {
    let dir = temp_dir();
    std::fs::write(dir.path().join("md_0_1.xtc"), "trajectory").unwrap();

    let center = ToolStage {
        input: Some(PathBuf::from("md_0_1.xtc")),
        output: Some(PathBuf::from("md_0_1_noPBC.xtc")),
        command: CommandSpec::new("sh")
            .args(["-c", "read group; read out; cp md_0_1.xtc md_0_1_noPBC.xtc"])
            .stdin("1\n0\n"),
        ..stage("center", "")
    };
    let deviation = ToolStage {
        input: Some(PathBuf::from("md_0_1_noPBC.xtc")),
        output: Some(PathBuf::from("rmsd.xvg")),
        ..stage("deviation", "echo '0.0 0.1' > rmsd.xvg")
    };
    let analyze = ToolStage {
        input: Some(PathBuf::from("rmsd.xvg")),
        ..stage(
            "analyze",
            "echo 'Analysis of rmsd.xvg'; echo 'SS1    0.452    0.011'; echo 'SS1 0.9 0.1'",
        )
    };

    let pipeline = ToolPipeline::new(vec![center, deviation, analyze], "SS1", dir.path());
    let output = pipeline.run().await.unwrap();

    assert_eq!(output.accuracy, "0.452");
    let names: Vec<&str> = output.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["center", "deviation", "analyze"]);
}

#[tokio::test]
async fn test_failing_stage_stops_the_chain() {
    let dir = temp_dir();
    let pipeline = ToolPipeline::new(
        vec![
            stage("center", "echo broken >&2; exit 2"),
            stage("deviation", "touch ran.txt"),
        ],
        "SS1",
        dir.path(),
    );

    let err = pipeline.run().await.unwrap_err();

    match err {
        ToolPipelineError::StageFailed { stage, stderr, .. } => {
            assert_eq!(stage, "center");
            assert_eq!(stderr, "broken");
        }
        other => panic!("expected StageFailed, got {other:?}"),
    }
    assert!(!dir.path().join("ran.txt").exists());
}

#[tokio::test]
async fn test_missing_input_prevents_stage_from_running() {
    let dir = temp_dir();
    let analyze = ToolStage {
        input: Some(PathBuf::from("rmsd.xvg")),
        ..stage("analyze", "touch ran.txt")
    };

    let err = ToolPipeline::new(vec![analyze], "SS1", dir.path())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ToolPipelineError::MissingInput { stage, .. } if stage == "analyze"));
    assert!(!dir.path().join("ran.txt").exists());
}

#[tokio::test]
async fn test_missing_output_is_a_stage_failure() {
    let dir = temp_dir();
    let deviation = ToolStage {
        output: Some(PathBuf::from("rmsd.xvg")),
        ..stage("deviation", "true")
    };

    let err = ToolPipeline::new(vec![deviation], "SS1", dir.path())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ToolPipelineError::MissingOutput { .. }));
}

#[tokio::test]
async fn test_analysis_without_marker_fails() {
    let dir = temp_dir();
    let err = ToolPipeline::new(vec![stage("analyze", "echo 'no summary'")], "SS1", dir.path())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ToolPipelineError::MarkerNotFound { marker } if marker == "SS1"));
}

#[tokio::test]
async fn test_unknown_program_is_a_spawn_error() {
    let dir = temp_dir();
    let missing = ToolStage {
        command: CommandSpec::new("definitely-not-an-installed-tool"),
        ..stage("center", "")
    };

    let err = ToolPipeline::new(vec![missing], "SS1", dir.path())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ToolPipelineError::Spawn { .. }));
}
