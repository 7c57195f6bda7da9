//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::FeedConfig;
use iapfeed_common::{InclusionReason, Subnet};
use std::path::Path;

/// Default configuration file name looked up in a directory.
pub const CONFIG_FILE: &str = "iapfeed.toml";

/// Loads and validates `iapfeed.toml` from a directory.
pub fn load_config(dir: &Path) -> Result<FeedConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<FeedConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<FeedConfig, ConfigError> {
    let config: FeedConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and values are consistent.
fn validate_config(config: &FeedConfig) -> Result<(), ConfigError> {
    let inventory = &config.inventory;
    if inventory.base_url.trim().is_empty() {
        return Err(ConfigError::MissingField("inventory.base_url".to_string()));
    }
    let has_token = inventory.api_token.is_some() || inventory.api_token_env.is_some();
    if !has_token && inventory.username.is_none() {
        return Err(ConfigError::MissingField(
            "inventory.api_token or inventory.username".to_string(),
        ));
    }
    if inventory.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "inventory.max_concurrency must be at least 1".to_string(),
        ));
    }
    if let Some(range) = &inventory.loopback_preferred_range {
        Subnet::parse(range, "", InclusionReason::Inventory).map_err(|e| {
            ConfigError::ValidationError(format!("inventory.loopback_preferred_range: {e}"))
        })?;
    }
    if config.cache.ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "cache.ttl_secs must be greater than 0".to_string(),
        ));
    }
    if config.upload.base_url.trim().is_empty() {
        return Err(ConfigError::MissingField("upload.base_url".to_string()));
    }
    if config.upload.username.trim().is_empty() {
        return Err(ConfigError::MissingField("upload.username".to_string()));
    }
    for (name, group) in [("vfz", &config.groups.vfz), ("pe", &config.groups.pe)] {
        if group.xml_groups.as_ref().is_some_and(Vec::is_empty) {
            return Err(ConfigError::ValidationError(format!(
                "groups.{name}.xml_groups must not be empty"
            )));
        }
        if group.upload_groups.as_ref().is_some_and(Vec::is_empty) {
            return Err(ConfigError::ValidationError(format!(
                "groups.{name}.upload_groups must not be empty"
            )));
        }
    }
    Ok(())
}
