use fepflow::analysis::AnalysisError;
use fepflow::core::cluster::ClusterError;
use fepflow::core::params::ConfigError;
use fepflow::core::schedule::ScheduleError;
use fepflow::workflows::window::{WindowError, WindowErrorKind};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_SCHEDULE: i32 = 2;
pub const EXIT_IO: i32 = 3;
pub const EXIT_ENGINE: i32 = 4;
pub const EXIT_MISSING_RESULT: i32 = 5;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl CliError {
    /// Process exit status reported to the batch scheduler.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Window(e) => match &e.kind {
                WindowErrorKind::Schedule(_) => EXIT_SCHEDULE,
                WindowErrorKind::Deck(_) | WindowErrorKind::Io { .. } => EXIT_IO,
                WindowErrorKind::EngineLaunch(_) | WindowErrorKind::EngineFailure { .. } => {
                    EXIT_ENGINE
                }
                WindowErrorKind::MissingResult { .. } => EXIT_MISSING_RESULT,
            },
            CliError::Schedule(_) => EXIT_SCHEDULE,
            CliError::Io(_) | CliError::Analysis(AnalysisError::Fepout(_)) => EXIT_IO,
            _ => EXIT_FAILURE,
        }
    }
}
