//! Normalized device records.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::subnet::Subnet;
use crate::vendor::{DeviceGroup, Vendor};

/// Interface name fragments that mark a loopback-type interface.
const LOOPBACK_MARKERS: &[&str] = &["loopback", "lo0", "lo "];

/// An address configured on an interface, host bits intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    /// The configured address.
    pub address: IpAddr,
    /// The configured prefix length.
    pub prefix_len: u8,
}

/// One interface as reported by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Interface index. Used as the deterministic loopback tie-break.
    pub index: u32,
    /// Interface name as reported upstream (e.g. `Loopback0`, `Gi0/0/0`).
    pub name: String,
    /// Configured addresses, IPv4 first in the order reported.
    pub addresses: Vec<InterfaceAddress>,
}

impl Interface {
    /// Returns `true` if the name marks a loopback-type interface.
    ///
    /// The Nokia `system` interface counts as a loopback.
    pub fn is_loopback(&self) -> bool {
        let name = self.name.to_ascii_lowercase();
        name == "system" || LOOPBACK_MARKERS.iter().any(|m| name.contains(m))
    }

    /// Returns the first IPv4 address on the interface, if any.
    pub fn first_ipv4(&self) -> Option<IpAddr> {
        self.addresses
            .iter()
            .map(|a| a.address)
            .find(IpAddr::is_ipv4)
    }

    /// Case-insensitive name comparison.
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(other.trim())
    }
}

/// The loopback address chosen for a device, with the interface it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopbackInterface {
    /// The loopback address written into the artifact.
    pub address: IpAddr,
    /// Index of the source interface.
    pub index: u32,
    /// Name of the source interface.
    pub name: String,
}

/// Lawful-intercept service support detected by configuration scanning.
///
/// The scan is a heuristic: no match yields [`LiSupport::Unknown`], never
/// [`LiSupport::Absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiSupport {
    /// A pattern confirming LI service configuration matched.
    Present,
    /// A pattern explicitly disabling LI matched.
    Absent,
    /// Nothing conclusive was found.
    Unknown,
}

/// A production device with everything the later stages need.
///
/// Built once by the inventory client and never mutated afterwards; later
/// stages wrap it instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Inventory identifier.
    pub id: u64,
    /// Hostname, trimmed and uppercased.
    pub name: String,
    /// Platform tag.
    pub vendor: Vendor,
    /// Whether the inventory reports the device as in production.
    pub in_production: bool,
    /// Group the device is published in.
    pub group: DeviceGroup,
    /// Selected loopback. Devices without one are skipped by the builder.
    pub loopback: Option<LoopbackInterface>,
    /// Raw interface records.
    pub interfaces: Vec<Interface>,
    /// Subnets derived from interfaces and diagnostics, deduplicated and sorted.
    pub subnets: Vec<Subnet>,
    /// Alternative hostname used by the scope database (OSS10 name).
    pub alias: Option<String>,
    /// LI support for platforms that are scanned; `None` when not applicable.
    pub li_support: Option<LiSupport>,
}

impl Device {
    /// Normalizes a raw hostname the way device names are stored.
    pub fn normalize_name(raw: &str) -> String {
        raw.trim().to_ascii_uppercase()
    }

    /// Returns `true` if the device has an interface with the given name.
    pub fn has_interface(&self, name: &str) -> bool {
        self.interfaces.iter().any(|i| i.name_matches(name))
    }
}
