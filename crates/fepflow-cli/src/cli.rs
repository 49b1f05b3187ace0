use clap::{Args, Parser, Subcommand};
use fepflow::core::schedule::Direction;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "fepflow - Runs alchemical free energy perturbation lambda windows as batch array tasks and combines them with BAR.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single lambda window: write its deck, run the engine and copy the result.
    Run(RunArgs),
    /// Write the job-array submission script covering every window of a run.
    Plan(PlanArgs),
    /// Print the lambda windows for a step size and direction.
    Schedule(ScheduleArgs),
    /// Combine finished forward and reverse runs into free energy estimates with BAR.
    Analyze(AnalyzeArgs),
}

/// Configuration sources shared by the commands that read a run configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to the run configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override `lambda.step-size` from the config file.
    #[arg(short = 's', long, value_name = "FLOAT")]
    pub step_size: Option<f64>,

    /// Override `lambda.direction` from the config file (forward or reverse).
    #[arg(short, long, value_name = "DIRECTION")]
    pub direction: Option<Direction>,

    /// Override `cluster.partition` from the config file.
    #[arg(short, long, value_name = "NAME")]
    pub partition: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S simulation.temperature=310
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// 1-based window index. Defaults to the job-array task id.
    #[arg(short, long, env = "SLURM_ARRAY_TASK_ID", value_name = "INT")]
    pub index: usize,

    /// Processing units allocated to this task. Defaults to the partition's cores per task.
    #[arg(long, env = "SLURM_CPUS_PER_TASK", value_name = "INT")]
    pub cpus: Option<u32>,

    /// Override `engine.executable` from the config file.
    #[arg(long, value_name = "PATH")]
    pub engine: Option<PathBuf>,
}

/// Arguments for the `plan` subcommand.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Where to write the submission script. Defaults to `<work-root>/submit.sh`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Maximum number of array tasks running at once.
    #[arg(short, long, value_name = "INT")]
    pub throttle: Option<usize>,

    /// Job name shown by the scheduler. Defaults to `fep_<stem>_<F|R>`.
    #[arg(long, value_name = "NAME")]
    pub job_name: Option<String>,
}

/// Arguments for the `schedule` subcommand.
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Width of each lambda window, in [1e-5, 1].
    #[arg(short, long, required = true, value_name = "FLOAT")]
    pub step_size: f64,

    /// Direction of the path (forward or reverse).
    #[arg(short, long, default_value = "forward", value_name = "DIRECTION")]
    pub direction: Direction,

    /// Print the windows as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directory containing the `FEP_F` and `FEP_R` run directories.
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    pub root: PathBuf,

    /// Prefix for the collected `.fepout` files.
    #[arg(short, long, default_value = "results", value_name = "NAME")]
    pub label: String,

    /// Directory for the collected `.fepout` files. Defaults to the root directory.
    #[arg(short, long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Simulation temperature in kelvin.
    #[arg(short, long, default_value_t = 298.0, value_name = "KELVIN")]
    pub temperature: f64,

    /// Also estimate the electrostatic and van der Waals contributions.
    #[arg(long)]
    pub decompose: bool,

    /// Use every sample instead of decorrelating each window first.
    #[arg(long)]
    pub no_subsample: bool,

    /// Print the full report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_overrides_and_index() {
        let cli = Cli::parse_from([
            "fepflow",
            "run",
            "-c",
            "fep.toml",
            "--index",
            "3",
            "--direction",
            "rev",
            "-S",
            "simulation.temperature=310",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.index, 3);
                assert_eq!(args.config.direction, Some(Direction::Reverse));
                assert_eq!(args.config.set_values, vec!["simulation.temperature=310"]);
            }
            other => panic!("Expected 'run' subcommand, got {:?}", other),
        }
    }

    #[test]
    fn schedule_defaults_to_forward() {
        let cli = Cli::parse_from(["fepflow", "schedule", "--step-size", "0.25"]);
        match cli.command {
            Commands::Schedule(args) => {
                assert_eq!(args.direction, Direction::Forward);
                assert_eq!(args.step_size, 0.25);
                assert!(!args.json);
            }
            other => panic!("Expected 'schedule' subcommand, got {:?}", other),
        }
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let result = Cli::try_parse_from(["fepflow", "schedule", "-s", "0.1", "-d", "sideways"]);
        assert!(result.is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["fepflow", "-q", "-v", "schedule", "-s", "0.1"]);
        assert!(result.is_err());
    }
}
