use crate::analysis::bar::bar;
use crate::analysis::timeseries::decorrelate;
use crate::analysis::{AnalysisError, thermal_energy};
use crate::core::io::fepout::{CollectOutcome, FepWindowData, collect_fepout, read_fepout_path};
use crate::core::schedule::Direction;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const LAMBDA_MATCH_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Directory holding the `FEP_F` and `FEP_R` run directories.
    pub root: PathBuf,
    /// Prefix of the collected `<label>_F.fepout` / `<label>_R.fepout` files.
    pub label: String,
    pub output_dir: PathBuf,
    pub temperature: f64,
    pub decompose: bool,
    pub subsample: bool,
}

/// Results directory of a run in the given direction under `root`.
pub fn results_dir(root: &Path, direction: Direction) -> PathBuf {
    root.join(run_dir_name(direction)).join("results")
}

/// `FEP_F` or `FEP_R`.
pub fn run_dir_name(direction: Direction) -> String {
    format!("FEP_{}", direction.tag())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyComponent {
    Total,
    Electrostatic,
    VanDerWaals,
}

impl EnergyComponent {
    pub fn name(self) -> &'static str {
        match self {
            EnergyComponent::Total => "Total",
            EnergyComponent::Electrostatic => "Elec",
            EnergyComponent::VanDerWaals => "VdW",
        }
    }

    fn samples(self, window: &FepWindowData) -> &[f64] {
        match self {
            EnergyComponent::Total => &window.delta_e,
            EnergyComponent::Electrostatic => &window.elec,
            EnergyComponent::VanDerWaals => &window.vdw,
        }
    }
}

/// BAR result for one forward/reverse window pair, in kcal/mol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowEstimate {
    pub window: usize,
    pub label: String,
    pub delta_g: f64,
    pub uncertainty: f64,
    pub cumulative: f64,
    pub cumulative_uncertainty: f64,
    pub inefficiency_forward: f64,
    pub inefficiency_reverse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentReport {
    pub component: EnergyComponent,
    pub windows: Vec<WindowEstimate>,
    pub net: f64,
    pub net_uncertainty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub temperature: f64,
    pub collected: Vec<PathBuf>,
    pub components: Vec<ComponentReport>,
}

/// Collects, parses and BAR-combines a finished forward and reverse run.
#[instrument(skip_all, name = "analysis_workflow")]
pub fn run(config: &AnalysisConfig) -> Result<AnalysisReport, AnalysisError> {
    if !config.temperature.is_finite() || config.temperature <= 0.0 {
        return Err(AnalysisError::InvalidTemperature(config.temperature));
    }
    let kt = thermal_energy(config.temperature);

    let mut collected = Vec::new();
    let mut load = |direction: Direction| -> Result<Vec<FepWindowData>, AnalysisError> {
        let source = results_dir(&config.root, direction);
        let output = config
            .output_dir
            .join(format!("{}_{}.fepout", config.label, direction.tag()));
        if let CollectOutcome::Concatenated { files } = collect_fepout(&source, &output)? {
            info!("Concatenated {} {} result file(s) into {:?}", files, direction, output);
        }
        let windows = read_fepout_path(&output)?;
        collected.push(output);
        Ok(windows)
    };

    let forward = load(Direction::Forward)?;
    let reverse = load(Direction::Reverse)?;
    if forward.len() != reverse.len() {
        return Err(AnalysisError::WindowMismatch {
            forward: forward.len(),
            reverse: reverse.len(),
        });
    }
    check_pairing(&forward, &reverse);

    let mut components = vec![EnergyComponent::Total];
    if config.decompose {
        components.extend([EnergyComponent::Electrostatic, EnergyComponent::VanDerWaals]);
    }

    let reports = components
        .into_iter()
        .map(|component| estimate_component(component, &forward, &reverse, kt, config.subsample))
        .collect::<Result<Vec<_>, _>>()?;

    for report in &reports {
        info!(
            "Net dG_{} = {:.4} +- {:.4} kcal/mol",
            report.component.name(),
            report.net,
            report.net_uncertainty
        );
    }

    Ok(AnalysisReport {
        temperature: config.temperature,
        collected,
        components: reports,
    })
}

/// Forward window `k` pairs with reverse window `n - 1 - k`; their lambda
/// endpoints should be swapped copies of each other.
fn check_pairing(forward: &[FepWindowData], reverse: &[FepWindowData]) {
    for (f, r) in forward.iter().zip(reverse.iter().rev()) {
        let matches = (f.lambda_start - r.lambda_end).abs() < LAMBDA_MATCH_TOLERANCE
            && (f.lambda_end - r.lambda_start).abs() < LAMBDA_MATCH_TOLERANCE;
        if !matches {
            warn!(
                "Forward window {} is paired with reverse window {}; lambdas do not mirror",
                f.label, r.label
            );
        }
    }
}

fn estimate_component(
    component: EnergyComponent,
    forward: &[FepWindowData],
    reverse: &[FepWindowData],
    kt: f64,
    subsample: bool,
) -> Result<ComponentReport, AnalysisError> {
    let prepare = |series: &[f64]| -> (Vec<f64>, f64) {
        let (samples, g) = if subsample {
            decorrelate(series)
        } else {
            (series.to_vec(), 1.0)
        };
        (samples.into_iter().map(|e| e / kt).collect(), g)
    };

    let mut windows = Vec::with_capacity(forward.len());
    let mut cumulative = 0.0;
    let mut cumulative_variance = 0.0;

    for (k, (f, r)) in forward.iter().zip(reverse.iter().rev()).enumerate() {
        let (w_f, g_f) = prepare(component.samples(f));
        let (w_r, g_r) = prepare(component.samples(r));
        let estimate = bar(&w_f, &w_r)?;

        let delta_g = estimate.delta_f * kt;
        let uncertainty = estimate.uncertainty * kt;
        cumulative += delta_g;
        cumulative_variance += uncertainty * uncertainty;

        windows.push(WindowEstimate {
            window: k + 1,
            label: f.label.clone(),
            delta_g,
            uncertainty,
            cumulative,
            cumulative_uncertainty: cumulative_variance.sqrt(),
            inefficiency_forward: g_f,
            inefficiency_reverse: g_r,
        });
    }

    Ok(ComponentReport {
        component,
        windows,
        net: cumulative,
        net_uncertainty: cumulative_variance.sqrt(),
    })
}
