//! Cluster partition profiles and SLURM array submission scripts.
//!
//! Each partition a run may be submitted to is described by a [`PartitionProfile`]
//! and selected by name, so switching hardware is a configuration value rather
//! than an edit to the submission script.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Processing units held back from the engine on every array task.
pub const RESERVED_UNITS: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Unknown partition '{name}'. Available partitions: [{available}]")]
    UnknownPartition { name: String, available: String },

    #[error("Invalid task distribution '{0}'. Expected 'block', 'cyclic', 'arbitrary' or 'plane=<n>'.")]
    InvalidDistribution(String),
}

/// Task distribution policy passed to `--distribution`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Distribution {
    #[default]
    Block,
    Cyclic,
    Arbitrary,
    Plane(u32),
}

impl FromStr for Distribution {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Distribution::Block),
            "cyclic" => Ok(Distribution::Cyclic),
            "arbitrary" => Ok(Distribution::Arbitrary),
            other => other
                .strip_prefix("plane=")
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|&n| n > 0)
                .map(Distribution::Plane)
                .ok_or_else(|| ClusterError::InvalidDistribution(s.to_string())),
        }
    }
}

impl TryFrom<String> for Distribution {
    type Error = ClusterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Block => write!(f, "block"),
            Distribution::Cyclic => write!(f, "cyclic"),
            Distribution::Arbitrary => write!(f, "arbitrary"),
            Distribution::Plane(n) => write!(f, "plane={}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartitionProfile {
    pub cores_per_task: u32,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl PartitionProfile {
    pub fn engine_parallelism(&self) -> u32 {
        engine_parallelism(self.cores_per_task)
    }
}

/// Engine process count for an allocation: everything but the reserved units,
/// and never less than one.
pub fn engine_parallelism(allocated_units: u32) -> u32 {
    allocated_units.saturating_sub(RESERVED_UNITS).max(1)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PartitionTable {
    profiles: BTreeMap<String, PartitionProfile>,
}

impl PartitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, profile: PartitionProfile) {
        self.profiles.insert(name.into(), profile);
    }

    pub fn get(&self, name: &str) -> Result<&PartitionProfile, ClusterError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ClusterError::UnknownPartition {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Everything needed to render the array submission script for one run.
#[derive(Debug, Clone)]
pub struct ArrayScript<'a> {
    pub job_name: String,
    pub partition: &'a str,
    pub profile: &'a PartitionProfile,
    pub windows: usize,
    /// Maximum number of array tasks running at once (`%N` suffix).
    pub throttle: Option<usize>,
    pub log_dir: PathBuf,
    /// Command run by every array task; the array index argument is appended.
    pub command: Vec<String>,
}

pub fn render_array_script(script: &ArrayScript<'_>) -> String {
    let mut lines = vec![
        "#!/bin/bash".to_string(),
        format!("#SBATCH --job-name={}", script.job_name),
        format!("#SBATCH --partition={}", script.partition),
    ];

    let mut array = format!("1-{}", script.windows);
    if let Some(limit) = script.throttle {
        array.push_str(&format!("%{}", limit));
    }
    lines.push(format!("#SBATCH --array={}", array));
    lines.push("#SBATCH --nodes=1".to_string());
    lines.push("#SBATCH --ntasks=1".to_string());
    lines.push(format!(
        "#SBATCH --cpus-per-task={}",
        script.profile.cores_per_task
    ));
    lines.push(format!(
        "#SBATCH --distribution={}",
        script.profile.distribution
    ));
    if !script.profile.exclude.is_empty() {
        lines.push(format!(
            "#SBATCH --exclude={}",
            script.profile.exclude.join(",")
        ));
    }
    lines.push(format!(
        "#SBATCH --output={}/%x_%A_%a.out",
        script.log_dir.display()
    ));
    lines.push(String::new());
    lines.push("set -euo pipefail".to_string());
    lines.push(String::new());

    let mut command: Vec<String> = script.command.iter().map(|arg| shell_quote(arg)).collect();
    command.push("--index".to_string());
    command.push("\"${SLURM_ARRAY_TASK_ID}\"".to_string());
    lines.push(command.join(" "));

    let mut rendered = lines.join("\n");
    rendered.push('\n');
    rendered
}

fn shell_quote(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+,@%".contains(c));
    if is_plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(exclude: &[&str]) -> PartitionProfile {
        PartitionProfile {
            cores_per_task: 24,
            distribution: Distribution::Cyclic,
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn script<'a>(profile: &'a PartitionProfile) -> ArrayScript<'a> {
        ArrayScript {
            job_name: "fep_F".to_string(),
            partition: "standard",
            profile,
            windows: 40,
            throttle: None,
            log_dir: PathBuf::from("logs"),
            command: vec![
                "fepflow".to_string(),
                "run".to_string(),
                "--config".to_string(),
                "/home/user/my run/fep.toml".to_string(),
            ],
        }
    }

    #[test]
    fn distribution_parses_and_displays() {
        assert_eq!("block".parse::<Distribution>(), Ok(Distribution::Block));
        assert_eq!("Cyclic".parse::<Distribution>(), Ok(Distribution::Cyclic));
        assert_eq!("plane=4".parse::<Distribution>(), Ok(Distribution::Plane(4)));
        assert_eq!(Distribution::Plane(4).to_string(), "plane=4");
        assert!(matches!(
            "plane=0".parse::<Distribution>(),
            Err(ClusterError::InvalidDistribution(_))
        ));
        assert!(matches!(
            "round-robin".parse::<Distribution>(),
            Err(ClusterError::InvalidDistribution(_))
        ));
    }

    #[test]
    fn parallelism_reserves_one_unit_but_never_drops_below_one() {
        assert_eq!(engine_parallelism(24), 23);
        assert_eq!(engine_parallelism(2), 1);
        assert_eq!(engine_parallelism(1), 1);
        assert_eq!(engine_parallelism(0), 1);
        assert_eq!(profile(&[]).engine_parallelism(), 23);
    }

    #[test]
    fn unknown_partition_lists_available_names() {
        let mut table = PartitionTable::new();
        table.insert("standard", profile(&[]));
        table.insert("gpu", profile(&[]));

        assert!(table.get("standard").is_ok());
        assert_eq!(
            table.get("bigmem"),
            Err(ClusterError::UnknownPartition {
                name: "bigmem".to_string(),
                available: "gpu, standard".to_string(),
            })
        );
    }

    #[test]
    fn script_contains_resource_directives_and_array_command() {
        let profile = profile(&["node07", "node11"]);
        let rendered = render_array_script(&script(&profile));

        assert!(rendered.starts_with("#!/bin/bash\n"));
        assert!(rendered.contains("#SBATCH --partition=standard\n"));
        assert!(rendered.contains("#SBATCH --array=1-40\n"));
        assert!(rendered.contains("#SBATCH --cpus-per-task=24\n"));
        assert!(rendered.contains("#SBATCH --distribution=cyclic\n"));
        assert!(rendered.contains("#SBATCH --exclude=node07,node11\n"));
        assert!(rendered.contains("#SBATCH --output=logs/%x_%A_%a.out\n"));
        assert!(rendered.ends_with(
            "fepflow run --config '/home/user/my run/fep.toml' --index \"${SLURM_ARRAY_TASK_ID}\"\n"
        ));
    }

    #[test]
    fn script_omits_empty_exclusion_list_and_applies_throttle() {
        let profile = profile(&[]);
        let mut array = script(&profile);
        array.throttle = Some(8);
        let rendered = render_array_script(&array);

        assert!(!rendered.contains("--exclude"));
        assert!(rendered.contains("#SBATCH --array=1-40%8\n"));
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain-arg"), "plain-arg");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
