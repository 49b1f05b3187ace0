//! # Core Module
//!
//! Stateless foundations of an FEP lambda-window workflow.
//!
//! - **Lambda Schedules** ([`schedule`]) - Forward and reverse lambda sequences and
//!   the mapping from a 1-based array index to a window
//! - **Input Decks** ([`deck`]) - Text composition of engine input decks from a template
//! - **Simulation Parameters** ([`params`]) - The immutable bag of input files and step counts
//! - **Cluster Profiles** ([`cluster`]) - Partition resource profiles and array script rendering
//! - **File I/O** ([`io`]) - Reading and collecting engine `.fepout` output

pub mod cluster;
pub mod deck;
pub mod io;
pub mod params;
pub mod schedule;
