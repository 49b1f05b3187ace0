use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Absolute tolerance used when comparing lambda values against the schedule bound.
pub const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Finest accepted step. Window end points must stay distinct once printed with
/// [`format_lambda`]'s six decimals, and the schedule is capped at 100 000 windows.
pub const MIN_STEP_SIZE: f64 = 1e-5;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Invalid lambda step size {0}: must be finite and within [1e-5, 1]")]
    InvalidStepSize(f64),

    #[error("Window index {index} is out of range: the schedule has {windows} window(s), indexed from 1")]
    IndexOutOfRange { index: usize, windows: usize },

    #[error("Unknown lambda direction '{0}'. Expected 'forward' or 'reverse'.")]
    UnknownDirection(String),
}

/// Direction of the alchemical transformation along lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Lambda runs from 0 to 1.
    Forward,
    /// Lambda runs from 1 to 0.
    Reverse,
}

impl Direction {
    /// The fixed starting point of the schedule, which is never stored as an
    /// enumerated point.
    pub fn anchor(self) -> f64 {
        match self {
            Direction::Forward => 0.0,
            Direction::Reverse => 1.0,
        }
    }

    pub fn bound(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => 0.0,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }

    /// Single-letter tag used in run directory and result file names.
    pub fn tag(self) -> char {
        match self {
            Direction::Forward => 'F',
            Direction::Reverse => 'R',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

impl FromStr for Direction {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "fwd" | "f" => Ok(Direction::Forward),
            "reverse" | "rev" | "r" => Ok(Direction::Reverse),
            other => Err(ScheduleError::UnknownDirection(other.to_string())),
        }
    }
}

/// An ordered lambda schedule.
///
/// The anchor (0 for forward, 1 for reverse) is implicit; `points` holds only the
/// enumerated values after it, so `points[k]` is the end of window `k + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaSchedule {
    direction: Direction,
    step_size: f64,
    points: Vec<f64>,
}

impl LambdaSchedule {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn anchor(&self) -> f64 {
        self.direction.anchor()
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn window_count(&self) -> usize {
        self.points.len()
    }

    /// The full sequence, anchor included.
    pub fn as_sequence(&self) -> Vec<f64> {
        std::iter::once(self.anchor())
            .chain(self.points.iter().copied())
            .collect()
    }

    pub fn windows(&self) -> impl Iterator<Item = LambdaWindow> + '_ {
        (1..=self.window_count()).map(move |index| self.window_unchecked(index))
    }

    fn window_unchecked(&self, index: usize) -> LambdaWindow {
        let lambda_start = if index == 1 {
            self.anchor()
        } else {
            self.points[index - 2]
        };
        LambdaWindow {
            index,
            lambda_start,
            lambda_end: self.points[index - 1],
            step_size: self.step_size,
            direction: self.direction,
        }
    }
}

/// One segment of the lambda path, simulated by a single array task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LambdaWindow {
    pub index: usize,
    pub lambda_start: f64,
    pub lambda_end: f64,
    pub step_size: f64,
    pub direction: Direction,
}

impl LambdaWindow {
    /// Label in the form the engine prints it, e.g. `[ 0 0.05 ]`.
    pub fn label(&self) -> String {
        format!(
            "[ {} {} ]",
            format_lambda(self.lambda_start),
            format_lambda(self.lambda_end)
        )
    }
}

/// Builds the lambda schedule for `step_size` in the given direction.
///
/// Points are generated as `anchor ± k * step_size` for `k = 1, 2, ...` while they
/// stay within the bound, inclusive of the bound itself. A point within
/// [`BOUNDARY_TOLERANCE`] of the bound is placed exactly on it. Both directions
/// therefore yield the same number of windows for the same step size.
///
/// Steps finer than [`MIN_STEP_SIZE`] are rejected.
pub fn build_schedule(step_size: f64, direction: Direction) -> Result<LambdaSchedule, ScheduleError> {
    if !step_size.is_finite() || step_size < MIN_STEP_SIZE || step_size > 1.0 + BOUNDARY_TOLERANCE {
        return Err(ScheduleError::InvalidStepSize(step_size));
    }

    let count = ((1.0 + BOUNDARY_TOLERANCE) / step_size).floor() as usize;
    let anchor = direction.anchor();
    let bound = direction.bound();
    let sign = direction.sign();

    let points = (1..=count)
        .map(|k| {
            let value = anchor + sign * (k as f64) * step_size;
            if (value - bound).abs() <= BOUNDARY_TOLERANCE {
                bound
            } else {
                value
            }
        })
        .collect();

    Ok(LambdaSchedule {
        direction,
        step_size,
        points,
    })
}

/// Maps a 1-based array index to its window.
///
/// Window 1 starts at the schedule anchor; window `i > 1` starts where window
/// `i - 1` ended.
pub fn window_for_index(
    schedule: &LambdaSchedule,
    index: usize,
) -> Result<LambdaWindow, ScheduleError> {
    if index == 0 || index > schedule.window_count() {
        return Err(ScheduleError::IndexOutOfRange {
            index,
            windows: schedule.window_count(),
        });
    }
    Ok(schedule.window_unchecked(index))
}

/// Formats a lambda value with at most six decimals and no trailing zeros.
pub fn format_lambda(value: f64) -> String {
    if value.abs() < 5e-7 {
        return "0".to_string();
    }
    let formatted = format!("{:.6}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
