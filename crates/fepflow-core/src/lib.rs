//! # fepflow Core Library
//!
//! Building blocks for running free-energy perturbation (FEP) calculations as an
//! array of independent lambda windows, one cluster array task per window, with
//! the molecular dynamics itself delegated to an external NAMD engine.
//!
//! ## Architectural Philosophy
//!
//! The library follows the same three-layer split used across the project:
//!
//! - **[`core`]: The Foundation.** Stateless pieces: the lambda schedule, the
//!   input deck assembler, simulation parameters, cluster partition profiles and
//!   the `.fepout` reader.
//!
//! - **[`analysis`]: The Estimators.** Correlation analysis and the Bennett
//!   acceptance ratio used to turn collected window energies into a free energy.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures: running a single
//!   lambda window against an [`workflows::window::EngineRunner`], and analyzing
//!   finished forward/reverse runs.

pub mod analysis;
pub mod core;
pub mod workflows;
