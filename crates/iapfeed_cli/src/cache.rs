//! `iapfeed cache`: maintenance of the response cache.

use iapfeed_pipeline::open_cache;

use crate::context::load_feed_config;
use crate::{CacheAction, GlobalArgs};

/// Runs the `iapfeed cache` command.
pub fn run(action: &CacheAction, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_feed_config(global)?;
    let cache = open_cache(&config);

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!("directory: {}", cache.dir().display());
            println!("live:      {}", stats.live);
            println!("expired:   {}", stats.expired);
            println!("corrupt:   {}", stats.corrupt);
            println!("bytes:     {}", stats.bytes);
        }
        CacheAction::Purge => {
            let removed = cache.purge_expired()?;
            if !global.quiet {
                eprintln!("     Purged {removed} entries");
            }
        }
        CacheAction::Clear { operation } => {
            let removed = match operation {
                Some(op) => cache.clear_operation(op)?,
                None => cache.clear()?,
            };
            if !global.quiet {
                eprintln!("    Cleared {removed} entries");
            }
        }
    }
    Ok(0)
}
