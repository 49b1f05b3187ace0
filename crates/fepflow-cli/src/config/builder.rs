use super::defaults::{DefaultsConfig, RESULTS_DIR_NAME};
use super::file::FileConfig;
use super::models::{AppConfig, EngineConfig};
use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};
use fepflow::core::params::SimulationParametersBuilder;
use fepflow::workflows::analyze::run_dir_name;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub fn build_config(args: &ConfigArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let config_path = std::path::absolute(&args.config)?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    debug!("Resolving relative paths against {:?}", base_dir);
    let resolve = |path: PathBuf| base_dir.join(path);

    let file_config = FileConfig::from_file(&config_path)?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let lambda_file = file_config.lambda.take().unwrap_or_default();
    let step_size = args.step_size.or(lambda_file.step_size).ok_or_else(|| {
        CliError::Config(
            "`lambda.step-size` is required either in the config file or via --step-size."
                .to_string(),
        )
    })?;
    let direction = args
        .direction
        .or(lambda_file.direction)
        .unwrap_or(defaults.direction);

    let sim_file = file_config.simulation.take().unwrap_or_default();
    let files = file_config.files.take().unwrap_or_default();

    let mut params = SimulationParametersBuilder::new()
        .temperature(sim_file.temperature.unwrap_or(defaults.temperature))
        .minimization_steps(
            sim_file
                .minimization_steps
                .unwrap_or(defaults.minimization_steps),
        )
        .equilibration_steps(
            sim_file
                .equilibration_steps
                .unwrap_or(defaults.equilibration_steps),
        )
        .production_steps(
            sim_file
                .production_steps
                .unwrap_or(defaults.production_steps),
        )
        .parameter_files(
            files
                .parameters
                .unwrap_or_default()
                .into_iter()
                .map(resolve)
                .collect(),
        );
    if let Some(path) = files.structure {
        params = params.structure(resolve(path));
    }
    if let Some(path) = files.coordinates {
        params = params.coordinates(resolve(path));
    }
    if let Some(path) = files.fep_topology {
        params = params.fep_topology(resolve(path));
    }
    if let Some(path) = files.restraints {
        params = params.restraints(resolve(path));
    }
    let params = params.build()?;

    let template = files.template.map(resolve).ok_or_else(|| {
        CliError::Config("`files.template` is required in the config file.".to_string())
    })?;

    let output_file = file_config.output.take().unwrap_or_default();
    let work_root = resolve(
        output_file
            .work_root
            .unwrap_or_else(|| PathBuf::from(run_dir_name(direction))),
    );
    let results_dir = output_file
        .results_dir
        .map(resolve)
        .unwrap_or_else(|| work_root.join(RESULTS_DIR_NAME));
    let stem = output_file.stem.unwrap_or(defaults.stem);
    if stem.is_empty() || stem.contains(['/', '\\']) {
        return Err(CliError::Config(format!(
            "`output.stem` must be a plain file name, got '{}'",
            stem
        )));
    }

    let engine_file = file_config.engine.take().unwrap_or_default();
    let executable = engine_file.executable.unwrap_or(defaults.executable);
    let engine = EngineConfig {
        executable: resolve_executable(&base_dir, executable),
        launcher: engine_file.launcher.filter(|l| !l.is_empty()),
        launcher_args: engine_file.launcher_args.unwrap_or_default(),
    };

    let partition = args
        .partition
        .clone()
        .or(file_config.cluster.take().and_then(|c| c.partition));
    if let Some(name) = &partition {
        file_config.partitions.get(name)?;
    }

    Ok(AppConfig {
        config_path,
        step_size,
        direction,
        params,
        template,
        work_root,
        results_dir,
        stem,
        engine,
        partition,
        partitions: file_config.partitions,
    })
}

/// Bare program names are left for `PATH` lookup; anything with a separator is
/// a path relative to the config file.
fn resolve_executable(base_dir: &Path, executable: String) -> String {
    if executable.contains(['/', '\\']) {
        base_dir.join(&executable).to_string_lossy().into_owned()
    } else {
        executable
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();
        let value_str = value_str.trim();

        match key {
            "lambda.step-size" => {
                config.lambda.get_or_insert_with(Default::default).step_size =
                    Some(parse_value(key, value_str, "float")?);
            }
            "lambda.direction" => {
                config.lambda.get_or_insert_with(Default::default).direction =
                    Some(parse_value(key, value_str, "direction")?);
            }
            "simulation.temperature" => {
                config
                    .simulation
                    .get_or_insert_with(Default::default)
                    .temperature = Some(parse_value(key, value_str, "float")?);
            }
            "simulation.minimization-steps" => {
                config
                    .simulation
                    .get_or_insert_with(Default::default)
                    .minimization_steps = Some(parse_value(key, value_str, "integer")?);
            }
            "simulation.equilibration-steps" => {
                config
                    .simulation
                    .get_or_insert_with(Default::default)
                    .equilibration_steps = Some(parse_value(key, value_str, "integer")?);
            }
            "simulation.production-steps" => {
                config
                    .simulation
                    .get_or_insert_with(Default::default)
                    .production_steps = Some(parse_value(key, value_str, "integer")?);
            }
            "files.template" => {
                config.files.get_or_insert_with(Default::default).template =
                    Some(PathBuf::from(value_str));
            }
            "output.work-root" => {
                config.output.get_or_insert_with(Default::default).work_root =
                    Some(PathBuf::from(value_str));
            }
            "output.results-dir" => {
                config.output.get_or_insert_with(Default::default).results_dir =
                    Some(PathBuf::from(value_str));
            }
            "output.stem" => {
                config.output.get_or_insert_with(Default::default).stem =
                    Some(value_str.to_string());
            }
            "engine.executable" => {
                config.engine.get_or_insert_with(Default::default).executable =
                    Some(value_str.to_string());
            }
            "engine.launcher" => {
                config.engine.get_or_insert_with(Default::default).launcher =
                    Some(value_str.to_string());
            }
            "cluster.partition" => {
                config.cluster.get_or_insert_with(Default::default).partition =
                    Some(value_str.to_string());
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fepflow::core::schedule::Direction;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const BASE_CONFIG: &str = r#"
        [lambda]
        step-size = 0.05

        [simulation]
        temperature = 300.0
        production-steps = 2500

        [files]
        structure = "inputs/sys.psf"
        coordinates = "inputs/sys.pdb"
        parameters = ["inputs/a.prm", "/abs/b.prm"]
        fep-topology = "inputs/sys.fep"
        restraints = "inputs/restraints.txt"
        template = "template.namd"

        [engine]
        launcher = "srun"
        launcher-args = ["--mpi=pmi2"]

        [cluster]
        partition = "standard"

        [partitions.standard]
        cores-per-task = 24

        [partitions.small]
        cores-per-task = 4
        exclude = ["n001"]
        "#;

    fn write_config(content: &str) -> (TempDir, ConfigArgs) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fep.toml");
        fs::write(&path, content).unwrap();
        let args = ConfigArgs {
            config: path,
            ..Default::default()
        };
        (dir, args)
    }

    #[test]
    fn file_values_merge_with_defaults_and_resolve_paths() {
        let (dir, args) = write_config(BASE_CONFIG);
        let config = build_config(&args).unwrap();

        assert_eq!(config.step_size, 0.05);
        assert_eq!(config.direction, Direction::Forward);
        assert_eq!(config.params.temperature, 300.0);
        assert_eq!(config.params.minimization_steps, 1000);
        assert_eq!(config.params.production_steps, 2500);
        assert_eq!(config.params.structure, dir.path().join("inputs/sys.psf"));
        assert_eq!(
            config.params.parameter_files,
            vec![dir.path().join("inputs/a.prm"), PathBuf::from("/abs/b.prm")]
        );
        assert_eq!(config.template, dir.path().join("template.namd"));
        assert_eq!(config.work_root, dir.path().join("FEP_F"));
        assert_eq!(config.results_dir, dir.path().join("FEP_F/results"));
        assert_eq!(config.stem, "lambda");
        assert_eq!(config.engine.executable, "namd2");
        assert_eq!(config.engine.launcher.as_deref(), Some("srun"));
        assert_eq!(config.partition.as_deref(), Some("standard"));
    }

    #[test]
    fn cli_overrides_file_and_set_values() {
        let (dir, mut args) = write_config(BASE_CONFIG);
        args.step_size = Some(0.25);
        args.direction = Some(Direction::Reverse);
        args.partition = Some("small".to_string());
        args.set_values = vec![
            "lambda.step-size=0.1".to_string(),
            "cluster.partition=standard".to_string(),
        ];

        let config = build_config(&args).unwrap();

        assert_eq!(config.step_size, 0.25);
        assert_eq!(config.direction, Direction::Reverse);
        assert_eq!(config.work_root, dir.path().join("FEP_R"));
        let (name, profile) = config.partition_profile().unwrap();
        assert_eq!(name, "small");
        assert_eq!(profile.cores_per_task, 4);
    }

    #[test]
    fn set_values_override_file_values() {
        let (dir, mut args) = write_config(BASE_CONFIG);
        args.set_values = vec![
            "simulation.temperature=310.5".to_string(),
            "simulation.equilibration-steps=42".to_string(),
            "output.stem=win".to_string(),
            "output.work-root=runs/fwd".to_string(),
            "engine.executable=bin/namd3".to_string(),
        ];

        let config = build_config(&args).unwrap();

        assert_eq!(config.params.temperature, 310.5);
        assert_eq!(config.params.equilibration_steps, 42);
        assert_eq!(config.stem, "win");
        assert_eq!(config.work_root, dir.path().join("runs/fwd"));
        assert_eq!(config.results_dir, dir.path().join("runs/fwd/results"));
        assert_eq!(
            PathBuf::from(&config.engine.executable),
            dir.path().join("bin/namd3")
        );
    }

    #[test]
    fn malformed_and_unknown_set_values_are_rejected() {
        let (_dir, mut args) = write_config(BASE_CONFIG);

        args.set_values = vec!["lambda.step-size".to_string()];
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));

        args.set_values = vec!["lambda.step-size=wide".to_string()];
        assert!(matches!(build_config(&args), Err(CliError::Config(_))));

        args.set_values = vec!["lambda.width=0.1".to_string()];
        match build_config(&args) {
            Err(CliError::Config(msg)) => assert!(msg.contains("lambda.width")),
            other => panic!("Expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn missing_required_values_are_reported() {
        let (_dir, args) = write_config(&BASE_CONFIG.replace("step-size = 0.05", ""));
        match build_config(&args) {
            Err(CliError::Config(msg)) => assert!(msg.contains("step-size")),
            other => panic!("Expected a config error, got {:?}", other),
        }

        let (_dir, args) =
            write_config(&BASE_CONFIG.replace("restraints = \"inputs/restraints.txt\"", ""));
        match build_config(&args) {
            Err(CliError::Config(msg)) => assert!(msg.contains("restraints")),
            other => panic!("Expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_partition_is_rejected() {
        let (_dir, mut args) = write_config(BASE_CONFIG);
        args.partition = Some("gpu".to_string());
        assert!(matches!(build_config(&args), Err(CliError::Cluster(_))));
    }

    #[test]
    fn partition_is_optional_until_needed() {
        let (_dir, args) = write_config(&BASE_CONFIG.replace("partition = \"standard\"", ""));
        let config = build_config(&args).unwrap();
        assert!(config.partition.is_none());
        assert!(matches!(
            config.partition_profile(),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn window_job_carries_the_merged_configuration() {
        let (dir, args) = write_config(BASE_CONFIG);
        let config = build_config(&args).unwrap();
        let job = config.window_job(3, 23);

        assert_eq!(job.index, 3);
        assert_eq!(job.parallelism, 23);
        assert_eq!(job.window_dir(), dir.path().join("FEP_F/lambda_03"));
        assert_eq!(job.output_prefix(), "lambda_03");
    }
}
