use super::progress::{Progress, ProgressReporter};
use crate::core::deck::{self, DeckError};
use crate::core::io::fepout::FEPOUT_EXTENSION;
use crate::core::params::SimulationParameters;
use crate::core::schedule::{Direction, ScheduleError, build_schedule, window_for_index};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument};

pub const DECK_EXTENSION: &str = "namd";
pub const LOG_EXTENSION: &str = "log";

/// States of a single array task. A task moves forward through these in order
/// and stops at the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStage {
    Init,
    ScheduleComputed,
    DeckAssembled,
    EngineRunning,
    ResultCopied,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Init => "initialization",
            RunStage::ScheduleComputed => "schedule computation",
            RunStage::DeckAssembled => "deck assembly",
            RunStage::EngineRunning => "engine run",
            RunStage::ResultCopied => "result copy",
            RunStage::Done => "summary",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("Window {index} failed during {stage}: {kind}")]
pub struct WindowError {
    pub index: usize,
    /// The stage that was being entered when the failure occurred.
    pub stage: RunStage,
    #[source]
    pub kind: WindowErrorKind,
}

#[derive(Debug, Error)]
pub enum WindowErrorKind {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Deck(#[from] DeckError),

    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to launch engine: {0}")]
    EngineLaunch(#[source] io::Error),

    #[error("Engine exited with {status}; see '{log}'", log = log.display())]
    EngineFailure { status: ExitStatusText, log: PathBuf },

    #[error("Engine finished but the expected result '{path}' is missing", path = path.display())]
    MissingResult { path: PathBuf },
}

/// Human-readable engine exit status (`code 1`, `a signal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatusText(pub Option<i32>);

impl fmt::Display for ExitStatusText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "code {}", code),
            None => write!(f, "a signal"),
        }
    }
}

/// How the external engine is asked to run one deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub deck_path: PathBuf,
    pub working_dir: PathBuf,
    pub log_path: PathBuf,
    /// Number of engine processes to request.
    pub parallelism: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOutcome {
    /// `None` when the engine was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl EngineOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The external simulation engine, treated as an opaque blocking process.
pub trait EngineRunner {
    /// Runs the engine to completion. An `Err` means the engine could not be
    /// started at all; a failed run is reported through [`EngineOutcome`].
    fn run(&self, invocation: &EngineInvocation) -> io::Result<EngineOutcome>;
}

/// Everything one array task needs, fixed before the task starts.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowJob {
    /// 1-based array index.
    pub index: usize,
    pub step_size: f64,
    pub direction: Direction,
    pub params: SimulationParameters,
    pub template: PathBuf,
    /// Parent of the per-window working directories.
    pub work_root: PathBuf,
    /// Shared directory collecting one result per finished window.
    pub results_dir: PathBuf,
    /// Stem of the engine output prefix.
    pub stem: String,
    pub parallelism: u32,
}

impl WindowJob {
    pub fn window_dir(&self) -> PathBuf {
        self.work_root.join(window_dir_name(self.index))
    }

    pub fn output_prefix(&self) -> String {
        format!("{}_{:02}", self.stem, self.index)
    }
}

/// Name of the working directory of window `index`, e.g. `lambda_07`.
pub fn window_dir_name(index: usize) -> String {
    format!("lambda_{:02}", index)
}

/// Record of a finished array task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub index: usize,
    pub direction: Direction,
    pub lambda_start: f64,
    pub lambda_end: f64,
    pub window_dir: PathBuf,
    pub deck: PathBuf,
    pub result: PathBuf,
    pub engine_exit_code: Option<i32>,
    pub elapsed_secs: f64,
    pub stage: RunStage,
}

/// Runs one lambda window from schedule computation to result hand-off.
///
/// The schedule is computed before anything is written, so an invalid step size
/// or index leaves the filesystem untouched. The result is copied rather than
/// moved, leaving the window directory complete.
#[instrument(skip_all, name = "window_workflow", fields(index = job.index, direction = %job.direction))]
pub fn run(
    job: &WindowJob,
    runner: &impl EngineRunner,
    reporter: &ProgressReporter,
) -> Result<RunSummary, WindowError> {
    let started = Instant::now();
    let fail = |stage: RunStage| {
        move |kind: WindowErrorKind| WindowError {
            index: job.index,
            stage,
            kind,
        }
    };

    // === Stage 1: Schedule ===
    let stage = RunStage::ScheduleComputed;
    reporter.report(Progress::StageStart { stage });
    let schedule = build_schedule(job.step_size, job.direction)
        .map_err(|e| fail(stage)(e.into()))?;
    let window = window_for_index(&schedule, job.index).map_err(|e| fail(stage)(e.into()))?;
    info!(
        "Window {} of {}: lambda {} -> {}",
        window.index,
        schedule.window_count(),
        window.lambda_start,
        window.lambda_end
    );
    reporter.report(Progress::StageFinish { stage });

    // === Stage 2: Deck ===
    let stage = RunStage::DeckAssembled;
    reporter.report(Progress::StageStart { stage });
    let window_dir = job.window_dir();
    fs::create_dir_all(&window_dir).map_err(|e| fail(stage)(io_kind(&window_dir, e)))?;
    let window_dir = std::path::absolute(&window_dir).map_err(|e| fail(stage)(io_kind(&window_dir, e)))?;

    let prefix = job.output_prefix();
    let deck_path = window_dir.join(format!("{}.{}", prefix, DECK_EXTENSION));
    let prepend = deck::fep_assignments(&job.params, &prefix);
    let append = deck::fep_directives(&job.params.for_window(window));
    deck::write_deck(&job.template, &prepend, &append, &deck_path)
        .map_err(|e| fail(stage)(e.into()))?;
    info!("Assembled deck {:?}", deck_path);
    reporter.report(Progress::StageFinish { stage });

    // === Stage 3: Engine ===
    let stage = RunStage::EngineRunning;
    reporter.report(Progress::StageStart { stage });
    let invocation = EngineInvocation {
        deck_path: deck_path.clone(),
        working_dir: window_dir.clone(),
        log_path: window_dir.join(format!("{}.{}", prefix, LOG_EXTENSION)),
        parallelism: job.parallelism.max(1),
    };
    info!(
        "Starting engine with {} process(es); log: {:?}",
        invocation.parallelism, invocation.log_path
    );
    let outcome = runner
        .run(&invocation)
        .map_err(|e| fail(stage)(WindowErrorKind::EngineLaunch(e)))?;
    if !outcome.success() {
        return Err(fail(stage)(WindowErrorKind::EngineFailure {
            status: ExitStatusText(outcome.exit_code),
            log: invocation.log_path,
        }));
    }
    reporter.report(Progress::StageFinish { stage });

    // === Stage 4: Result ===
    let stage = RunStage::ResultCopied;
    reporter.report(Progress::StageStart { stage });
    let result_name = format!("{}.{}", prefix, FEPOUT_EXTENSION);
    let artifact = window_dir.join(&result_name);
    if !artifact.is_file() {
        return Err(fail(stage)(WindowErrorKind::MissingResult { path: artifact }));
    }
    fs::create_dir_all(&job.results_dir).map_err(|e| fail(stage)(io_kind(&job.results_dir, e)))?;
    let destination = job.results_dir.join(&result_name);
    let bytes = fs::copy(&artifact, &destination).map_err(|e| fail(stage)(io_kind(&destination, e)))?;
    debug!("Copied {} byte(s) to {:?}", bytes, destination);
    reporter.report(Progress::StageFinish { stage });

    Ok(RunSummary {
        index: window.index,
        direction: window.direction,
        lambda_start: window.lambda_start,
        lambda_end: window.lambda_end,
        window_dir,
        deck: deck_path,
        result: destination,
        engine_exit_code: outcome.exit_code,
        elapsed_secs: started.elapsed().as_secs_f64(),
        stage: RunStage::Done,
    })
}

fn io_kind(path: &Path, source: io::Error) -> WindowErrorKind {
    WindowErrorKind::Io {
        path: path.to_path_buf(),
        source,
    }
}
