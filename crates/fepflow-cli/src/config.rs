//! Run configuration: TOML file, `--set` overrides and command-line flags,
//! merged in that order of increasing precedence over built-in defaults.

mod builder;
mod defaults;
mod file;
mod models;

pub use builder::build_config;
pub use models::{AppConfig, EngineConfig};
