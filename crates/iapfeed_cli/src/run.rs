//! `iapfeed run`: generate, validate and upload one or more groups.

use std::sync::Arc;

use iapfeed_pipeline::{GenerationRun, Pipeline, RunOptions, RunState};

use crate::context::{cancel_on_ctrl_c, load_feed_config, selected_groups};
use crate::{GlobalArgs, RunArgs};

/// Runs the `iapfeed run` command.
///
/// Selected groups run concurrently. Returns exit code 0 when every run
/// completed, 1 otherwise.
pub async fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_feed_config(global)?;
    let groups = selected_groups(&config, args.group)?;
    let pipeline = Arc::new(Pipeline::from_config(config)?);
    let cancel = cancel_on_ctrl_c();
    let options = RunOptions {
        force_refresh: args.force_refresh,
        no_upload: args.no_upload,
    };

    let mut handles = Vec::with_capacity(groups.len());
    for group in groups {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            pipeline.run_group(group, options, &cancel).await
        }));
    }

    let mut all_completed = true;
    for handle in handles {
        let run = handle.await??;
        all_completed &= run.state == RunState::Completed;
        report(&run, global);
    }
    Ok(if all_completed { 0 } else { 1 })
}

fn report(run: &GenerationRun, global: &GlobalArgs) {
    if run.state == RunState::Completed {
        if global.quiet {
            return;
        }
        let path = run
            .output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        eprintln!(
            "   Finished {} ({} devices) {path}{}",
            run.group,
            run.device_count,
            if run.uploaded { ", uploaded" } else { "" }
        );
    } else if let Some(failure) = &run.error {
        eprintln!(
            "     Failed {} at {}: {}",
            run.group, failure.stage, failure.cause
        );
    }
    if !global.quiet {
        for failure in &run.device_failures {
            eprintln!(
                "    skipped {} ({}): {}",
                failure.device, failure.stage, failure.reason
            );
        }
    }
}
