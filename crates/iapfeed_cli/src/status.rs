//! `iapfeed status`: print the last recorded run per group.

use iapfeed_pipeline::{read_status, GenerationRun};

use crate::context::{load_feed_config, selected_groups};
use crate::{GlobalArgs, GroupSelection, ReportFormat};

/// Runs the `iapfeed status` command.
///
/// Returns 1 when a shown run ended in `failed`.
pub fn run(
    selection: GroupSelection,
    format: ReportFormat,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_feed_config(global)?;
    let groups = selected_groups(&config, selection)?;

    let mut runs = Vec::new();
    for group in groups {
        match read_status(&config.output.dir, group)? {
            Some(run) => runs.push(run),
            None => {
                if !global.quiet {
                    eprintln!("no run recorded for {group}");
                }
            }
        }
    }

    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&runs)?),
        ReportFormat::Text => {
            for run in &runs {
                println!("{}", render(run));
            }
        }
    }
    let failed = runs.iter().any(|r| r.error.is_some());
    Ok(if failed { 1 } else { 0 })
}

fn render(run: &GenerationRun) -> String {
    let mut out = format!(
        "{} {} ({})\n  started   {}\n  updated   {}\n  devices   {}",
        run.group,
        run.state,
        run.run_id,
        run.started_at.to_rfc3339(),
        run.updated_at.to_rfc3339(),
        run.device_count
    );
    if let Some(path) = &run.output_path {
        out.push_str(&format!("\n  output    {}", path.display()));
    }
    if let Some(path) = &run.compressed_path {
        out.push_str(&format!("\n  gzip      {}", path.display()));
    }
    if let Some(failure) = &run.error {
        out.push_str(&format!("\n  failed at {}: {}", failure.stage, failure.cause));
    }
    for failure in &run.device_failures {
        out.push_str(&format!(
            "\n  skipped   {} ({}): {}",
            failure.device, failure.stage, failure.reason
        ));
    }
    out
}
