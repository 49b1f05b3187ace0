//! Provides input/output functionality for engine output formats.
//!
//! Currently this covers the NAMD alchemical output (`.fepout`) written once per
//! lambda window, including collecting the files of a whole run in window order.

pub mod fepout;
