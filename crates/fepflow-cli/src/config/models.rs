use crate::error::{CliError, Result};
use fepflow::core::cluster::{PartitionProfile, PartitionTable};
use fepflow::core::params::SimulationParameters;
use fepflow::core::schedule::Direction;
use fepflow::workflows::window::WindowJob;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Program name looked up on `PATH`, or a resolved path.
    pub executable: String,
    pub launcher: Option<String>,
    pub launcher_args: Vec<String>,
}

/// Fully merged run configuration. All paths are absolute.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub step_size: f64,
    pub direction: Direction,
    pub params: SimulationParameters,
    pub template: PathBuf,
    pub work_root: PathBuf,
    pub results_dir: PathBuf,
    pub stem: String,
    pub engine: EngineConfig,
    pub partition: Option<String>,
    pub partitions: PartitionTable,
}

impl AppConfig {
    /// The selected partition and its profile.
    pub fn partition_profile(&self) -> Result<(&str, &PartitionProfile)> {
        let name = self.partition.as_deref().ok_or_else(|| {
            CliError::Config(
                "`cluster.partition` is required either in the config file or via --partition."
                    .to_string(),
            )
        })?;
        Ok((name, self.partitions.get(name)?))
    }

    pub fn window_job(&self, index: usize, parallelism: u32) -> WindowJob {
        WindowJob {
            index,
            step_size: self.step_size,
            direction: self.direction,
            params: self.params.clone(),
            template: self.template.clone(),
            work_root: self.work_root.clone(),
            results_dir: self.results_dir.clone(),
            stem: self.stem.clone(),
            parallelism,
        }
    }
}
