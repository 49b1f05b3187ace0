use crate::core::schedule::LambdaWindow;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Input files and stage lengths shared by every window of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    pub structure: PathBuf,
    pub coordinates: PathBuf,
    pub parameter_files: Vec<PathBuf>,
    pub fep_topology: PathBuf,
    pub restraints: PathBuf,
    /// Kelvin.
    pub temperature: f64,
    pub minimization_steps: u64,
    pub equilibration_steps: u64,
    pub production_steps: u64,
}

impl SimulationParameters {
    pub fn for_window(&self, window: LambdaWindow) -> WindowParameters {
        WindowParameters {
            window,
            temperature: self.temperature,
            minimization_steps: self.minimization_steps,
            equilibration_steps: self.equilibration_steps,
            production_steps: self.production_steps,
        }
    }
}

/// Stage parameters for one lambda window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowParameters {
    pub window: LambdaWindow,
    pub temperature: f64,
    pub minimization_steps: u64,
    pub equilibration_steps: u64,
    pub production_steps: u64,
}

impl WindowParameters {
    /// Dynamics steps after minimization: equilibration plus production.
    pub fn total_md_steps(&self) -> u64 {
        self.equilibration_steps + self.production_steps
    }
}

#[derive(Default)]
pub struct SimulationParametersBuilder {
    structure: Option<PathBuf>,
    coordinates: Option<PathBuf>,
    parameter_files: Vec<PathBuf>,
    fep_topology: Option<PathBuf>,
    restraints: Option<PathBuf>,
    temperature: Option<f64>,
    minimization_steps: Option<u64>,
    equilibration_steps: Option<u64>,
    production_steps: Option<u64>,
}

impl SimulationParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn structure(mut self, path: PathBuf) -> Self {
        self.structure = Some(path);
        self
    }
    pub fn coordinates(mut self, path: PathBuf) -> Self {
        self.coordinates = Some(path);
        self
    }
    pub fn parameter_file(mut self, path: PathBuf) -> Self {
        self.parameter_files.push(path);
        self
    }
    pub fn parameter_files(mut self, paths: Vec<PathBuf>) -> Self {
        self.parameter_files = paths;
        self
    }
    pub fn fep_topology(mut self, path: PathBuf) -> Self {
        self.fep_topology = Some(path);
        self
    }
    pub fn restraints(mut self, path: PathBuf) -> Self {
        self.restraints = Some(path);
        self
    }
    pub fn temperature(mut self, kelvin: f64) -> Self {
        self.temperature = Some(kelvin);
        self
    }
    pub fn minimization_steps(mut self, steps: u64) -> Self {
        self.minimization_steps = Some(steps);
        self
    }
    pub fn equilibration_steps(mut self, steps: u64) -> Self {
        self.equilibration_steps = Some(steps);
        self
    }
    pub fn production_steps(mut self, steps: u64) -> Self {
        self.production_steps = Some(steps);
        self
    }

    pub fn build(self) -> Result<SimulationParameters, ConfigError> {
        if self.parameter_files.is_empty() {
            return Err(ConfigError::MissingParameter("parameter_files"));
        }
        let temperature = self
            .temperature
            .ok_or(ConfigError::MissingParameter("temperature"))?;
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "temperature",
                reason: format!("must be a positive number of kelvin, got {}", temperature),
            });
        }

        Ok(SimulationParameters {
            structure: self
                .structure
                .ok_or(ConfigError::MissingParameter("structure"))?,
            coordinates: self
                .coordinates
                .ok_or(ConfigError::MissingParameter("coordinates"))?,
            parameter_files: self.parameter_files,
            fep_topology: self
                .fep_topology
                .ok_or(ConfigError::MissingParameter("fep_topology"))?,
            restraints: self
                .restraints
                .ok_or(ConfigError::MissingParameter("restraints"))?,
            temperature,
            minimization_steps: self
                .minimization_steps
                .ok_or(ConfigError::MissingParameter("minimization_steps"))?,
            equilibration_steps: self
                .equilibration_steps
                .ok_or(ConfigError::MissingParameter("equilibration_steps"))?,
            production_steps: self
                .production_steps
                .ok_or(ConfigError::MissingParameter("production_steps"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schedule::{Direction, build_schedule, window_for_index};

    fn complete_builder() -> SimulationParametersBuilder {
        SimulationParametersBuilder::new()
            .structure("a.psf".into())
            .coordinates("a.pdb".into())
            .parameter_files(vec!["a.prm".into(), "b.prm".into()])
            .fep_topology("a.fep".into())
            .restraints("a.extrabonds".into())
            .temperature(300.0)
            .minimization_steps(100)
            .equilibration_steps(200)
            .production_steps(300)
    }

    #[test]
    fn build_succeeds_with_all_parameters() {
        let params = complete_builder().build().unwrap();
        assert_eq!(params.parameter_files.len(), 2);
        assert_eq!(params.temperature, 300.0);
    }

    #[test]
    fn build_reports_first_missing_parameter() {
        let result = SimulationParametersBuilder::new()
            .parameter_file("a.prm".into())
            .temperature(300.0)
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("structure")));
    }

    #[test]
    fn build_requires_at_least_one_parameter_file() {
        let result = complete_builder().parameter_files(vec![]).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("parameter_files")));
    }

    #[test]
    fn build_rejects_non_positive_temperature() {
        let result = complete_builder().temperature(0.0).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter {
                name: "temperature",
                ..
            })
        ));
    }

    #[test]
    fn window_parameters_pass_stage_lengths_through() {
        let params = complete_builder().build().unwrap();
        let schedule = build_schedule(0.5, Direction::Forward).unwrap();
        let window = window_for_index(&schedule, 2).unwrap();

        let wp = params.for_window(window);
        assert_eq!(wp.window, window);
        assert_eq!(wp.minimization_steps, 100);
        assert_eq!(wp.total_md_steps(), 500);
    }
}
