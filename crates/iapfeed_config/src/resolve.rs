//! Group resolution and secret lookup.

use crate::error::ConfigError;
use crate::types::FeedConfig;
use iapfeed_common::DeviceGroup;

/// Inventory group id of the CMTS devices when not overridden.
const DEFAULT_CMTS_INVENTORY_GROUP: u64 = 207;

/// A device group with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    /// The group.
    pub group: DeviceGroup,
    /// Whether `run --group all` includes this group.
    pub enabled: bool,
    /// Inventory device group id.
    pub inventory_group: u64,
    /// Artifact file name prefix.
    pub file_prefix: String,
    /// Group ids written into every `<iap>`.
    pub xml_groups: Vec<u32>,
    /// Group ids sent with the import request.
    pub upload_groups: Vec<u32>,
}

/// Resolves one device group by overlaying configured values on the built-in defaults.
///
/// The CMTS group has a default inventory group; the PE group has none and
/// must be configured.
pub fn resolve_group(
    config: &FeedConfig,
    group: DeviceGroup,
) -> Result<ResolvedGroup, ConfigError> {
    let (overrides, prefix, xml_groups, upload_groups, inventory_default) = match group {
        DeviceGroup::Cmts => (
            &config.groups.vfz,
            "EVE_NL_Infra_CMTS",
            vec![15],
            vec![3],
            Some(DEFAULT_CMTS_INVENTORY_GROUP),
        ),
        DeviceGroup::Pe => (&config.groups.pe, "EVE_NL_SOHO", vec![3], vec![1, 4, 15], None),
    };

    let inventory_group = overrides
        .inventory_group
        .or(inventory_default)
        .ok_or_else(|| ConfigError::MissingField(format!("groups.{group}.inventory_group")))?;

    Ok(ResolvedGroup {
        group,
        enabled: overrides.enabled,
        inventory_group,
        file_prefix: overrides
            .file_prefix
            .clone()
            .unwrap_or_else(|| prefix.to_string()),
        xml_groups: overrides.xml_groups.clone().unwrap_or(xml_groups),
        upload_groups: overrides.upload_groups.clone().unwrap_or(upload_groups),
    })
}

/// Resolves a secret given inline or through an environment variable.
///
/// An inline value wins. A named variable that is unset is an error, so a
/// typo in the variable name does not silently disable authentication.
pub fn resolve_secret(
    field: &str,
    inline: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<String>, ConfigError> {
    if let Some(value) = inline {
        return Ok(Some(value.to_string()));
    }
    match env_var {
        Some(name) => std::env::var(name).map(Some).map_err(|_| {
            ConfigError::MissingField(format!("{field} (environment variable {name} is not set)"))
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    const BASE: &str = r#"
[inventory]
base_url = "https://netshot.example.net/api"
api_token = "t"

[upload]
base_url = "https://li.example.net"
username = "feeder"
"#;

    #[test]
    fn cmts_defaults() {
        let config = load_config_from_str(BASE).unwrap();
        let g = resolve_group(&config, DeviceGroup::Cmts).unwrap();
        assert_eq!(g.inventory_group, 207);
        assert_eq!(g.file_prefix, "EVE_NL_Infra_CMTS");
        assert_eq!(g.xml_groups, vec![15]);
        assert_eq!(g.upload_groups, vec![3]);
        assert!(g.enabled);
    }

    #[test]
    fn pe_requires_inventory_group() {
        let config = load_config_from_str(BASE).unwrap();
        let err = resolve_group(&config, DeviceGroup::Pe).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "groups.pe.inventory_group"));
    }

    #[test]
    fn pe_overrides() {
        let toml = format!(
            "{BASE}\n[groups.pe]\ninventory_group = 310\nfile_prefix = \"EVE_NL_PE\"\nenabled = false\n"
        );
        let config = load_config_from_str(&toml).unwrap();
        let g = resolve_group(&config, DeviceGroup::Pe).unwrap();
        assert_eq!(g.inventory_group, 310);
        assert_eq!(g.file_prefix, "EVE_NL_PE");
        assert_eq!(g.xml_groups, vec![3]);
        assert_eq!(g.upload_groups, vec![1, 4, 15]);
        assert!(!g.enabled);
    }

    #[test]
    fn inline_secret_wins() {
        let s = resolve_secret("upload.password", Some("inline"), Some("UNUSED_VAR")).unwrap();
        assert_eq!(s.as_deref(), Some("inline"));
    }

    #[test]
    fn absent_secret_is_none() {
        assert!(resolve_secret("upload.password", None, None).unwrap().is_none());
    }

    #[test]
    fn unset_env_secret_errors() {
        let err = resolve_secret(
            "upload.password",
            None,
            Some("IAPFEED_TEST_SURELY_UNSET_VARIABLE"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("IAPFEED_TEST_SURELY_UNSET_VARIABLE"));
    }
}
