pub mod analyze;
pub mod plan;
pub mod run;
pub mod schedule;
