//! `iapfeed warm`: refresh the inventory cache ahead of a run.

use iapfeed_pipeline::Pipeline;

use crate::context::{cancel_on_ctrl_c, load_feed_config, selected_groups};
use crate::{GlobalArgs, GroupSelection};

/// Runs the `iapfeed warm` command.
///
/// Groups are fetched one after the other with a forced refresh. Returns 1
/// when any device could not be fetched.
pub async fn run(
    selection: GroupSelection,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_feed_config(global)?;
    let groups = selected_groups(&config, selection)?;
    let pipeline = Pipeline::from_config(config)?;
    let cancel = cancel_on_ctrl_c();

    let mut code = 0;
    for group in groups {
        let fetched = pipeline.warm(group, &cancel).await?;
        if !global.quiet {
            eprintln!(
                "     Warmed {group}: {} devices, {} dropped",
                fetched.devices.len(),
                fetched.dropped.len()
            );
        }
        if !fetched.dropped.is_empty() {
            code = 1;
        }
    }
    Ok(code)
}
