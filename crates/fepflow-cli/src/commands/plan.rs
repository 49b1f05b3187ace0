use crate::cli::PlanArgs;
use crate::config::{AppConfig, build_config};
use crate::error::Result;
use fepflow::core::cluster::{ArrayScript, render_array_script};
use fepflow::core::schedule::build_schedule;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const SCRIPT_NAME: &str = "submit.sh";
const LOG_DIR_NAME: &str = "slurm-logs";

pub async fn run(args: PlanArgs) -> Result<()> {
    let config = build_config(&args.config)?;
    let executable = std::env::current_exe()?;
    let (output, windows) = write_plan(&args, &config, &executable)?;

    println!(
        "Wrote array script for {} {} window(s) to {}",
        windows,
        config.direction,
        output.display()
    );
    println!("Submit it with: sbatch {}", output.display());
    Ok(())
}

/// Renders the submission script and writes it, creating the scheduler log
/// directory alongside. Returns the script path and the number of windows.
fn write_plan(args: &PlanArgs, config: &AppConfig, executable: &Path) -> Result<(PathBuf, usize)> {
    let (partition, profile) = config.partition_profile()?;
    let schedule = build_schedule(config.step_size, config.direction)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.work_root.join(SCRIPT_NAME));
    let log_dir = config.work_root.join(LOG_DIR_NAME);
    let job_name = args.job_name.clone().unwrap_or_else(|| {
        format!("fep_{}_{}", config.stem, config.direction.tag())
    });

    let script = render_array_script(&ArrayScript {
        job_name,
        partition,
        profile,
        windows: schedule.window_count(),
        throttle: args.throttle.filter(|&t| t > 0),
        log_dir: log_dir.clone(),
        command: run_command(executable, args, config),
    });

    fs::create_dir_all(&log_dir)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, script)?;
    info!(
        "Array script for {} window(s) on partition '{}' written to {:?}",
        schedule.window_count(),
        partition,
        output
    );

    Ok((output, schedule.window_count()))
}

/// The `run` invocation each array task executes, with the merged lambda
/// settings pinned so every task sees the same schedule.
fn run_command(executable: &Path, args: &PlanArgs, config: &AppConfig) -> Vec<String> {
    let mut command = vec![
        executable.to_string_lossy().into_owned(),
        "run".to_string(),
        "--config".to_string(),
        config.config_path.to_string_lossy().into_owned(),
        "--step-size".to_string(),
        config.step_size.to_string(),
        "--direction".to_string(),
        config.direction.to_string(),
    ];
    if let Some(partition) = &config.partition {
        command.push("--partition".to_string());
        command.push(partition.clone());
    }
    for kv in &args.config.set_values {
        command.push("--set".to_string());
        command.push(kv.clone());
    }
    command
}
