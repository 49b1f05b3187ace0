use fepflow::core::schedule::Direction;

pub const RESULTS_DIR_NAME: &str = "results";

pub struct DefaultsConfig {
    pub direction: Direction,
    pub temperature: f64,
    pub minimization_steps: u64,
    pub equilibration_steps: u64,
    pub production_steps: u64,
    pub stem: String,
    pub executable: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Forward,
            temperature: 298.0,
            minimization_steps: 1000,
            equilibration_steps: 100_000,
            production_steps: 500_000,
            stem: "lambda".to_string(),
            executable: "namd2".to_string(),
        }
    }
}
