//! # Workflows Module
//!
//! High-level procedures tying the [`crate::core`] pieces together.
//!
//! - **Window Workflow** ([`window`]) - One array task: schedule, deck, engine run and
//!   result hand-off for a single lambda window
//! - **Analysis Workflow** ([`analyze`]) - Collecting finished forward and reverse runs
//!   and combining them into a free energy profile
//! - **Progress Reporting** ([`progress`]) - Stage notifications for front ends

pub mod analyze;
pub mod progress;
pub mod window;
