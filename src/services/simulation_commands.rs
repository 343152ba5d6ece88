//! Builds the engine's preparation and run commands for a variation.

use std::path::{Path, PathBuf};

use crate::domain::errors::{RunError, RunResult};
use crate::domain::models::{RunVariation, SimulationConfig};
use crate::infrastructure::process::CommandSpec;

/// Factor selecting the prepared system.
pub const FORCE_FIELD: &str = "force_field";
/// Factor selecting the integrator parameter file.
pub const ALGORITHM: &str = "algorithm";
/// Factor selecting the step count of the parameter file.
pub const MD_STEPS: &str = "md_steps";

/// The two commands that start a simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationCommands {
    /// Preprocessing (`grompp`): must succeed before the run starts.
    pub prep: CommandSpec,
    /// The long-running simulation (`mdrun`).
    pub run: CommandSpec,
}

impl SimulationCommands {
    /// Input paths are made absolute so the commands can run from the
    /// scratch directory; the prepared run input lands there as
    /// `<deffnm>.tpr`.
    pub fn for_variation(config: &SimulationConfig, variation: &RunVariation) -> RunResult<Self> {
        let force_field = variation.require(FORCE_FIELD)?.to_string();
        let algorithm = variation.require(ALGORITHM)?;
        let md_steps = variation.require(MD_STEPS)?;

        let system = absolute(&system_dir(config, &force_field)?)?;
        let params = absolute(
            &config
                .systems_dir
                .join("algorithms")
                .join(format!("{algorithm}_{md_steps}.mdp")),
        )?;

        let prep = CommandSpec::new(&config.engine)
            .arg("grompp")
            .arg("-f")
            .arg(path_arg(&params))
            .arg("-c")
            .arg(path_arg(&system.join(&config.structure_file)))
            .arg("-t")
            .arg(path_arg(&system.join(&config.checkpoint_file)))
            .arg("-p")
            .arg(path_arg(&system.join(&config.topology_file)))
            .arg("-o")
            .arg(format!("{}.tpr", config.deffnm));

        let run = CommandSpec::new(&config.engine).args(["mdrun", "-v", "-deffnm", config.deffnm.as_str()]);

        Ok(Self { prep, run })
    }
}

fn system_dir(config: &SimulationConfig, force_field: &str) -> RunResult<PathBuf> {
    config
        .force_fields
        .get(force_field)
        .or(config.fallback_system.as_ref())
        .cloned()
        .ok_or_else(|| RunError::UnknownForceField(force_field.to_string()))
}

fn absolute(path: &Path) -> RunResult<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| RunError::io(format!("resolving {}", path.display()), e))
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FactorLevel;

    fn variation(force_field: &str) -> RunVariation {
        RunVariation::new([
            (FORCE_FIELD, FactorLevel::from(force_field)),
            (ALGORITHM, FactorLevel::from("md")),
            (MD_STEPS, FactorLevel::from(50_000_i64)),
        ])
    }

    fn rooted() -> SimulationConfig {
        let mut config = SimulationConfig {
            systems_dir: PathBuf::from("/opt/systems"),
            fallback_system: Some(PathBuf::from("/opt/systems/new")),
            ..Default::default()
        };
        config
            .force_fields
            .insert("allatom".to_string(), PathBuf::from("/opt/systems/1ka_aa"));
        config
    }

    #[test]
    fn test_allatom_uses_mapped_system() {
        let cmds = SimulationCommands::for_variation(&rooted(), &variation("allatom")).unwrap();

        assert_eq!(
            cmds.prep.to_string(),
            "gmx grompp -f /opt/systems/algorithms/md_50000.mdp \
             -c /opt/systems/1ka_aa/1AKI_solv_ions.gro -t /opt/systems/1ka_aa/npt.cpt \
             -p /opt/systems/1ka_aa/topol.top -o md_0_1.tpr"
        );
        assert_eq!(cmds.run.to_string(), "gmx mdrun -v -deffnm md_0_1");
    }

    #[test]
    fn test_unmapped_force_field_uses_fallback() {
        let cmds = SimulationCommands::for_variation(&rooted(), &variation("charmm")).unwrap();
        assert!(cmds.prep.get_args().contains(&"/opt/systems/new/topol.top".to_string()));
    }

    #[test]
    fn test_relative_defaults_become_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let cmds =
            SimulationCommands::for_variation(&SimulationConfig::default(), &variation("allatom"))
                .unwrap();
        let args = cmds.prep.get_args();

        let expected = cwd.join("systems/1ka_aa/topol.top");
        assert!(args.contains(&expected.display().to_string()));
        for flag in ["-f", "-c", "-t", "-p"] {
            let idx = args.iter().position(|a| a == flag).unwrap();
            assert!(Path::new(&args[idx + 1]).is_absolute(), "{flag} should be absolute");
        }
        assert_eq!(args.last().map(String::as_str), Some("md_0_1.tpr"));
    }

    #[test]
    fn test_unknown_force_field_without_fallback() {
        let config = SimulationConfig {
            fallback_system: None,
            ..Default::default()
        };
        let err = SimulationCommands::for_variation(&config, &variation("amber")).unwrap_err();
        assert!(matches!(err, RunError::UnknownForceField(ff) if ff == "amber"));
    }

    #[test]
    fn test_missing_factor() {
        let config = SimulationConfig::default();
        let partial = RunVariation::new([(FORCE_FIELD, "allatom")]);
        let err = SimulationCommands::for_variation(&config, &partial).unwrap_err();
        assert!(matches!(err, RunError::MissingFactor(f) if f == ALGORITHM));
    }
}
