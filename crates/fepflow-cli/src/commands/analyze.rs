use crate::cli::AnalyzeArgs;
use crate::error::{CliError, Result};
use fepflow::workflows::analyze::{self, AnalysisConfig, AnalysisReport, ComponentReport};

pub async fn run(args: AnalyzeArgs) -> Result<()> {
    let config = analysis_config(&args);

    println!("Analyzing runs under {}...", config.root.display());
    let report = tokio::task::block_in_place(|| analyze::run(&config))?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| CliError::Other(e.into()))?;
        println!("{}", json);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

fn analysis_config(args: &AnalyzeArgs) -> AnalysisConfig {
    AnalysisConfig {
        root: args.root.clone(),
        label: args.label.clone(),
        output_dir: args.output_dir.clone().unwrap_or_else(|| args.root.clone()),
        temperature: args.temperature,
        decompose: args.decompose,
        subsample: !args.no_subsample,
    }
}

fn render_report(report: &AnalysisReport) -> String {
    report
        .components
        .iter()
        .map(render_component)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_component(component: &ComponentReport) -> String {
    let name = component.component.name();
    let mut out = format!("Correlation times for dG_{}\n", name);
    out.push_str(&format!("{:>6} {:>10} {:>10}\n", "Window", "F", "R"));
    for w in &component.windows {
        out.push_str(&format!(
            "{:>6} {:>10.3} {:>10.3}\n",
            w.window, w.inefficiency_forward, w.inefficiency_reverse
        ));
    }

    out.push_str(&format!("\nBAR estimate for dG_{}\n", name));
    out.push_str(&format!(
        "{:>6} {:>10} {:>10} {:>13}\n",
        "Window", "dG", "ddG", "Uncert."
    ));
    for w in &component.windows {
        out.push_str(&format!(
            "{:>6} {:>10.4} {:>10.4} +- {:>9.4}\n",
            w.window, w.cumulative, w.delta_g, w.uncertainty
        ));
    }
    out.push_str(&format!(
        "\nNet dG_{} energy difference = {:.4} +- {:.4} kcal/mol\n",
        name, component.net, component.net_uncertainty
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fepflow::workflows::analyze::{EnergyComponent, WindowEstimate};
    use std::path::PathBuf;

    #[test]
    fn output_dir_defaults_to_root() {
        let args = AnalyzeArgs {
            root: PathBuf::from("/runs/ligand"),
            label: "results".to_string(),
            output_dir: None,
            temperature: 310.0,
            decompose: true,
            no_subsample: true,
            json: false,
        };
        let config = analysis_config(&args);
        assert_eq!(config.output_dir, PathBuf::from("/runs/ligand"));
        assert_eq!(config.temperature, 310.0);
        assert!(config.decompose);
        assert!(!config.subsample);
    }

    #[test]
    fn report_lists_windows_and_net_value() {
        let report = AnalysisReport {
            temperature: 298.0,
            collected: vec![],
            components: vec![ComponentReport {
                component: EnergyComponent::Total,
                windows: vec![WindowEstimate {
                    window: 1,
                    label: "[ 0 1 ]".to_string(),
                    delta_g: 1.25,
                    uncertainty: 0.1,
                    cumulative: 1.25,
                    cumulative_uncertainty: 0.1,
                    inefficiency_forward: 2.0,
                    inefficiency_reverse: 3.5,
                }],
                net: 1.25,
                net_uncertainty: 0.1,
            }],
        };

        let text = render_report(&report);
        assert!(text.contains("Correlation times for dG_Total"));
        assert!(text.contains("3.500"));
        assert!(text.contains("+-    0.1000"));
        assert!(text.contains("Net dG_Total energy difference = 1.2500 +- 0.1000 kcal/mol"));
    }
}
