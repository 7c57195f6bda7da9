//! Rows of the external scope database.

use serde::{Deserialize, Serialize};

/// One address scope as stored in the reconciliation database.
///
/// Only used to confirm or supplement a device's subnet list; never written
/// to the artifact directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRecord {
    /// Network address, or a full `address/prefix` string.
    pub network: String,
    /// Dotted-decimal netmask, `/N`, `N`, or empty when `network` carries the prefix.
    #[serde(default)]
    pub netmask: String,
    /// Hostname of the owning device as known to the scope database.
    pub hostname: String,
    /// Owning interface name, when recorded.
    #[serde(default)]
    pub interface: Option<String>,
    /// VLAN identifier, when recorded.
    #[serde(default)]
    pub vlan: Option<u32>,
    /// Inactive rows are ignored by reconciliation.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
