use std::path::PathBuf;

use clap::Parser;
use energy_runner::cli::{Cli, Commands};
use energy_runner::FactorLevel;

#[test]
fn test_parse_run_with_factors() {
    let cli = Cli::try_parse_from(vec![
        "energy-runner",
        "run",
        "--run-nr",
        "3",
        "--factor",
        "force_field=allatom",
        "-f",
        "md_steps=50000",
    ])
    .unwrap();

    assert!(!cli.json);
    assert!(cli.config.is_none());
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.run_nr, 3);
            assert_eq!(
                args.factors,
                vec![
                    ("force_field".to_string(), FactorLevel::from("allatom")),
                    ("md_steps".to_string(), FactorLevel::Integer(50_000)),
                ]
            );
        }
        Commands::Experiment(_) => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_run_defaults() {
    let cli = Cli::try_parse_from(vec!["energy-runner", "run"]).unwrap();
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.run_nr, 0);
            assert!(args.factors.is_empty());
        }
        Commands::Experiment(_) => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_malformed_factor_fails() {
    let result = Cli::try_parse_from(vec!["energy-runner", "run", "--factor", "allatom"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_experiment_with_global_flags() {
    let cli = Cli::try_parse_from(vec![
        "energy-runner",
        "experiment",
        "--variations",
        "variations.yaml",
        "--json",
        "--config",
        "energy-runner.yaml",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("energy-runner.yaml")));
    match cli.command {
        Commands::Experiment(args) => {
            assert_eq!(args.variations, PathBuf::from("variations.yaml"));
        }
        Commands::Run(_) => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_experiment_requires_variations() {
    assert!(Cli::try_parse_from(vec!["energy-runner", "experiment"]).is_err());
}
