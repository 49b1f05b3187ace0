use crate::cli::RunArgs;
use crate::config::{AppConfig, EngineConfig, build_config};
use crate::engine::ProcessRunner;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use fepflow::core::cluster::engine_parallelism;
use fepflow::workflows::{progress::ProgressReporter, window};
use tracing::info;

pub async fn run(args: RunArgs) -> Result<()> {
    let config = build_config(&args.config)?;
    let allocated = allocated_units(&config, args.cpus, args.index)?;
    let parallelism = engine_parallelism(allocated);
    info!(
        "Window {} uses {} of {} allocated processing unit(s) for the engine",
        args.index, parallelism, allocated
    );

    let runner = ProcessRunner::new(engine_config(&config, &args));
    let job = config.window_job(args.index, parallelism);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let summary = tokio::task::block_in_place(|| window::run(&job, &runner, &reporter))
        .inspect_err(|_| progress_handler.clear())?;

    info!(
        index = summary.index,
        direction = %summary.direction,
        lambda_start = summary.lambda_start,
        lambda_end = summary.lambda_end,
        result = %summary.result.display(),
        elapsed_secs = summary.elapsed_secs,
        "Window completed"
    );
    let line = serde_json::to_string(&summary).map_err(|e| CliError::Other(e.into()))?;
    println!("{}", line);

    Ok(())
}

/// Processing units granted to this task: the scheduler's allocation when
/// known, otherwise the selected partition's cores per task.
fn allocated_units(config: &AppConfig, cpus: Option<u32>, index: usize) -> Result<u32> {
    match cpus {
        Some(0) => Err(CliError::Argument(format!(
            "Window {} failed during resource allocation: the number of allocated CPUs must be at least 1",
            index
        ))),
        Some(n) => Ok(n),
        None => match config.partition_profile() {
            Ok((_, profile)) => Ok(profile.cores_per_task),
            Err(CliError::Config(reason)) => Err(CliError::Config(format!(
                "Window {} failed during resource allocation: {}",
                index, reason
            ))),
            Err(e) => Err(e),
        },
    }
}

fn engine_config(config: &AppConfig, args: &RunArgs) -> EngineConfig {
    let mut engine = config.engine.clone();
    if let Some(path) = &args.engine {
        engine.executable = path.to_string_lossy().into_owned();
    }
    engine
}
