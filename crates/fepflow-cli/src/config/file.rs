use crate::error::{CliError, Result};
use fepflow::core::cluster::PartitionTable;
use fepflow::core::schedule::Direction;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileLambdaConfig {
    pub step_size: Option<f64>,
    pub direction: Option<Direction>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSimulationConfig {
    pub temperature: Option<f64>,
    pub minimization_steps: Option<u64>,
    pub equilibration_steps: Option<u64>,
    pub production_steps: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileInputFiles {
    pub structure: Option<PathBuf>,
    pub coordinates: Option<PathBuf>,
    pub parameters: Option<Vec<PathBuf>>,
    pub fep_topology: Option<PathBuf>,
    pub restraints: Option<PathBuf>,
    pub template: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOutputConfig {
    pub work_root: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub stem: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileEngineConfig {
    pub executable: Option<String>,
    pub launcher: Option<String>,
    pub launcher_args: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileClusterConfig {
    pub partition: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub lambda: Option<FileLambdaConfig>,
    pub simulation: Option<FileSimulationConfig>,
    pub files: Option<FileInputFiles>,
    pub output: Option<FileOutputConfig>,
    pub engine: Option<FileEngineConfig>,
    pub cluster: Option<FileClusterConfig>,
    #[serde(default)]
    pub partitions: PartitionTable,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
