//! # Analysis Module
//!
//! Free energy estimators applied to the energy differences collected from the
//! lambda windows of a forward and a reverse run.
//!
//! - **Correlation** ([`timeseries`]) - Statistical inefficiency and subsampling of
//!   correlated samples
//! - **Estimation** ([`bar`]) - The Bennett acceptance ratio for one pair of
//!   forward/reverse work distributions

pub mod bar;
pub mod timeseries;

use crate::core::io::fepout::FepoutError;
use thiserror::Error;

/// Boltzmann constant in kcal/(mol K), as used by the engine.
pub const BOLTZMANN_KCAL_PER_MOL_K: f64 = 0.001987191;

/// Thermal energy `kT` in kcal/mol.
pub fn thermal_energy(temperature: f64) -> f64 {
    BOLTZMANN_KCAL_PER_MOL_K * temperature
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No {0} work samples to estimate from")]
    EmptySamples(&'static str),

    #[error("Work samples contain non-finite values")]
    NonFiniteSamples,

    #[error("BAR did not converge after {iterations} iterations")]
    Convergence { iterations: usize },

    #[error("Forward run has {forward} window(s) but reverse run has {reverse}")]
    WindowMismatch { forward: usize, reverse: usize },

    #[error("Invalid temperature {0} K")]
    InvalidTemperature(f64),

    #[error(transparent)]
    Fepout(#[from] FepoutError),
}
