//! Platform tags and device groups.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform tag of a device.
///
/// The recognized tags form a closed set. A tag the inventory reports but
/// this set does not know is carried as [`Vendor::Unrecognized`] so that the
/// artifact builder can reject the device explicitly instead of guessing a
/// type code for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Vendor {
    /// Cisco IOS-XR routers (`cisco-ios-xr`).
    CiscoIosXr,
    /// Juniper Junos routers (`juniper`).
    Juniper,
    /// Nokia SR OS in model-driven mode (`nokia-sros-md`).
    NokiaSrosMd,
    /// Cisco cBR-8 CMTS (`cisco-cbr8`).
    CiscoCbr8,
    /// Casa Systems CMTS (`casa-cmts`).
    CasaCmts,
    /// Arris/CommScope E6000 CMTS (`arris-e6000`).
    ArrisE6000,
    /// Any tag outside the closed set.
    Unrecognized(String),
}

impl Vendor {
    /// All recognized platforms.
    pub const KNOWN: [Vendor; 6] = [
        Vendor::CiscoIosXr,
        Vendor::Juniper,
        Vendor::NokiaSrosMd,
        Vendor::CiscoCbr8,
        Vendor::CasaCmts,
        Vendor::ArrisE6000,
    ];

    /// Returns the canonical tag string.
    pub fn tag(&self) -> &str {
        match self {
            Vendor::CiscoIosXr => "cisco-ios-xr",
            Vendor::Juniper => "juniper",
            Vendor::NokiaSrosMd => "nokia-sros-md",
            Vendor::CiscoCbr8 => "cisco-cbr8",
            Vendor::CasaCmts => "casa-cmts",
            Vendor::ArrisE6000 => "arris-e6000",
            Vendor::Unrecognized(tag) => tag.as_str(),
        }
    }

    /// Parses a tag. Unknown tags become [`Vendor::Unrecognized`].
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase();
        Self::KNOWN
            .iter()
            .find(|v| v.tag() == normalized)
            .cloned()
            .unwrap_or_else(|| Vendor::Unrecognized(tag.trim().to_string()))
    }

    /// Returns `true` for tags in the closed set.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Vendor::Unrecognized(_))
    }

    /// Returns `true` for cable modem termination platforms.
    pub fn is_cmts(&self) -> bool {
        matches!(
            self,
            Vendor::CiscoCbr8 | Vendor::CasaCmts | Vendor::ArrisE6000
        )
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<String> for Vendor {
    fn from(tag: String) -> Self {
        Vendor::from_tag(&tag)
    }
}

impl From<Vendor> for String {
    fn from(vendor: Vendor) -> Self {
        vendor.tag().to_string()
    }
}

/// The device group a run processes. Each group produces its own artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceGroup {
    /// Cable modem termination systems, historically called `vfz`.
    #[serde(rename = "vfz", alias = "cmts")]
    Cmts,
    /// Provider edge routers.
    #[serde(rename = "pe")]
    Pe,
}

impl DeviceGroup {
    /// Both groups, in processing order.
    pub const ALL: [DeviceGroup; 2] = [DeviceGroup::Cmts, DeviceGroup::Pe];

    /// Returns the short name used in config sections, status files and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceGroup::Cmts => "vfz",
            DeviceGroup::Pe => "pe",
        }
    }
}

impl fmt::Display for DeviceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a device group name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device group '{input}' (expected vfz, cmts or pe)")]
pub struct ParseGroupError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for DeviceGroup {
    type Err = ParseGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vfz" | "cmts" => Ok(DeviceGroup::Cmts),
            "pe" => Ok(DeviceGroup::Pe),
            _ => Err(ParseGroupError {
                input: s.to_string(),
            }),
        }
    }
}
