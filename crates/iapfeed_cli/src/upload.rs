//! `iapfeed upload`: re-send an existing artifact.

use std::path::Path;

use iapfeed_common::DeviceGroup;
use iapfeed_pipeline::Pipeline;
use iapfeed_upload::ImportOutcome;

use crate::context::load_feed_config;
use crate::{GlobalArgs, UploadArgs};

/// Runs the `iapfeed upload` command.
pub async fn run(args: &UploadArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_feed_config(global)?;
    let pipeline = Pipeline::from_config(config)?;
    let group = DeviceGroup::from(args.group);

    let outcome = pipeline.upload_existing(group, Path::new(&args.file)).await?;
    if !global.quiet {
        match outcome {
            ImportOutcome::Imported { status } => {
                eprintln!("   Uploaded {} for {group} (HTTP {status})", args.file)
            }
            ImportOutcome::DryRun { bytes } => eprintln!(
                "   Verified {} for {group}: {bytes} bytes, import skipped",
                args.file
            ),
        }
    }
    Ok(0)
}
