use crate::cli::ScheduleArgs;
use crate::error::{CliError, Result};
use fepflow::core::schedule::{LambdaSchedule, LambdaWindow, build_schedule, format_lambda};
use tracing::info;

pub async fn run(args: ScheduleArgs) -> Result<()> {
    let schedule = build_schedule(args.step_size, args.direction)?;
    info!(
        "{} schedule with step {} has {} window(s)",
        schedule.direction(),
        schedule.step_size(),
        schedule.window_count()
    );

    if args.json {
        let windows: Vec<LambdaWindow> = schedule.windows().collect();
        let json = serde_json::to_string_pretty(&windows).map_err(|e| CliError::Other(e.into()))?;
        println!("{}", json);
    } else {
        print!("{}", render_table(&schedule));
    }
    Ok(())
}

fn render_table(schedule: &LambdaSchedule) -> String {
    let mut out = format!(
        "{:>6}  {:>10}  {:>10}\n",
        "Window", "Start", "End"
    );
    for window in schedule.windows() {
        out.push_str(&format!(
            "{:>6}  {:>10}  {:>10}\n",
            window.index,
            format_lambda(window.lambda_start),
            format_lambda(window.lambda_end)
        ));
    }
    out
}
