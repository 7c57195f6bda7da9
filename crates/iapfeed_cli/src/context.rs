//! Shared helpers for CLI commands: configuration lookup, group selection
//! and Ctrl-C handling.

use std::path::{Path, PathBuf};

use iapfeed_common::DeviceGroup;
use iapfeed_config::{resolve_group, FeedConfig, CONFIG_FILE};
use tokio_util::sync::CancellationToken;

use crate::{GlobalArgs, GroupSelection, SingleGroup};

/// Walks up from `start` looking for the nearest `iapfeed.toml`.
pub fn find_config_file(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Loads the configuration named by `--config`, or the nearest `iapfeed.toml`.
///
/// A `--config` directory is searched for `iapfeed.toml`.
pub fn load_feed_config(global: &GlobalArgs) -> Result<FeedConfig, Box<dyn std::error::Error>> {
    let path = match global.config.as_deref() {
        Some(given) => {
            let p = PathBuf::from(given);
            if p.is_dir() {
                p.join(CONFIG_FILE)
            } else {
                p
            }
        }
        None => find_config_file(&std::env::current_dir()?)?,
    };
    tracing::debug!(path = %path.display(), "loading configuration");
    Ok(iapfeed_config::load_config_file(&path)?)
}

/// Expands a selection into concrete groups.
///
/// `all` yields the groups enabled in the configuration; naming a group
/// explicitly runs it even when disabled.
pub fn selected_groups(
    config: &FeedConfig,
    selection: GroupSelection,
) -> Result<Vec<DeviceGroup>, Box<dyn std::error::Error>> {
    match selection {
        GroupSelection::Vfz => Ok(vec![DeviceGroup::Cmts]),
        GroupSelection::Pe => Ok(vec![DeviceGroup::Pe]),
        GroupSelection::All => {
            let mut groups = Vec::new();
            for group in DeviceGroup::ALL {
                if resolve_group(config, group).is_ok_and(|g| g.enabled) {
                    groups.push(group);
                }
            }
            if groups.is_empty() {
                return Err("no device group is enabled and fully configured".into());
            }
            Ok(groups)
        }
    }
}

impl From<SingleGroup> for DeviceGroup {
    fn from(group: SingleGroup) -> Self {
        match group {
            SingleGroup::Vfz => DeviceGroup::Cmts,
            SingleGroup::Pe => DeviceGroup::Pe,
        }
    }
}

/// Returns a token cancelled on the first Ctrl-C.
///
/// Runs stop at the next stage boundary; in-flight requests finish or time out.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current stage");
            trigger.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[inventory]
base_url = "https://netshot.example.net/api"
api_token = "t"

[upload]
base_url = "https://li.example.net"
username = "feeder"
"#;

    fn global(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config,
        }
    }

    #[test]
    fn finds_config_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), MINIMAL).unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_config_file(&nested).unwrap(), dir.path().join(CONFIG_FILE));
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_config_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn config_flag_accepts_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), MINIMAL).unwrap();
        let config =
            load_feed_config(&global(Some(dir.path().display().to_string()))).unwrap();
        assert_eq!(config.upload.username, "feeder");
    }

    #[test]
    fn all_skips_unconfigured_groups() {
        let config = iapfeed_config::load_config_from_str(MINIMAL).unwrap();
        let groups = selected_groups(&config, GroupSelection::All).unwrap();
        assert_eq!(groups, vec![DeviceGroup::Cmts]);
    }

    #[test]
    fn all_includes_configured_pe() {
        let text = format!("{MINIMAL}\n[groups.pe]\ninventory_group = 310\n");
        let config = iapfeed_config::load_config_from_str(&text).unwrap();
        let groups = selected_groups(&config, GroupSelection::All).unwrap();
        assert_eq!(groups, vec![DeviceGroup::Cmts, DeviceGroup::Pe]);
    }

    #[test]
    fn explicit_group_ignores_enabled_flag() {
        let text = format!("{MINIMAL}\n[groups.vfz]\nenabled = false\n");
        let config = iapfeed_config::load_config_from_str(&text).unwrap();
        assert!(selected_groups(&config, GroupSelection::All).is_err());
        assert_eq!(
            selected_groups(&config, GroupSelection::Vfz).unwrap(),
            vec![DeviceGroup::Cmts]
        );
    }
}
