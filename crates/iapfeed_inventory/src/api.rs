//! Wire records returned by the device-management API.
//!
//! Field names follow the upstream JSON. Only the fields the pipeline reads
//! are declared; everything else is ignored.

use serde::Deserialize;

/// Status value of devices that are in production.
pub const IN_PRODUCTION: &str = "INPRODUCTION";

/// Name of the diagnostic carrying CMTS subnet data.
pub const CMTS_SUBNET_DIAGNOSTIC: &str = "CMTS_LI_SUBNETS";

/// A device as listed by `GET devices?group=<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDevice {
    /// Inventory identifier.
    pub id: u64,
    /// Hostname as recorded upstream.
    #[serde(default)]
    pub name: String,
    /// Device family (driver description).
    #[serde(default)]
    pub family: String,
    /// Lifecycle status (`INPRODUCTION`, `DISABLED`, ...).
    #[serde(default)]
    pub status: String,
}

/// Device detail as returned by `GET devices/<id>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDeviceDetail {
    /// Free-text comments.
    #[serde(default)]
    pub comments: Option<String>,
}

/// One address on an interface.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAddress {
    /// Address text.
    pub ip: String,
    /// Prefix length.
    #[serde(default, rename = "prefixLength")]
    pub prefix_length: Option<u8>,
}

/// An interface as returned by `GET devices/<id>/interfaces`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInterface {
    /// Upstream interface identifier, when reported.
    #[serde(default)]
    pub id: Option<u64>,
    /// Interface name.
    #[serde(default, rename = "interfaceName", alias = "name")]
    pub name: String,
    /// IPv4 addresses.
    #[serde(default, rename = "ip4Addresses")]
    pub ip4_addresses: Vec<RawAddress>,
    /// IPv6 addresses.
    #[serde(default, rename = "ip6Addresses")]
    pub ip6_addresses: Vec<RawAddress>,
    /// Legacy single-address field.
    #[serde(default, rename = "ipAddress")]
    pub ip_address: Option<String>,
}

/// One diagnostic result from `GET devices/<id>/diagnosticresults`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDiagnosticResult {
    /// Diagnostic name.
    #[serde(default, rename = "diagnosticName")]
    pub diagnostic_name: String,
    /// Result text. For JSON diagnostics this is a JSON document.
    #[serde(default)]
    pub text: Option<String>,
}

/// Payload of the `CMTS_LI_SUBNETS` diagnostic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmtsSubnetDiagnostic {
    /// Vendor string reported by the diagnostic script.
    #[serde(default)]
    pub vendor: Option<String>,
    /// IPv4 subnets in CIDR notation.
    #[serde(default)]
    pub ipv4_subnets: Vec<String>,
    /// IPv6 subnets in CIDR notation.
    #[serde(default)]
    pub ipv6_subnets: Vec<String>,
}

/// A configuration snapshot from `GET devices/<id>/configs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigSnapshot {
    /// Snapshot identifier.
    pub id: u64,
    /// Snapshot time, milliseconds since the epoch.
    #[serde(default, rename = "changeDate")]
    pub change_date: i64,
}

/// Picks the most recent snapshot (latest change date, then highest id).
pub fn latest_snapshot(snapshots: &[RawConfigSnapshot]) -> Option<&RawConfigSnapshot> {
    snapshots.iter().max_by_key(|s| (s.change_date, s.id))
}

/// Finds and decodes the CMTS subnet diagnostic among a device's results.
///
/// Returns `None` when the diagnostic is absent or its text is not valid JSON.
pub fn find_cmts_diagnostic(results: &[RawDiagnosticResult]) -> Option<CmtsSubnetDiagnostic> {
    let text = results
        .iter()
        .find(|r| r.diagnostic_name == CMTS_SUBNET_DIAGNOSTIC)?
        .text
        .as_deref()?;
    match serde_json::from_str(text) {
        Ok(diag) => Some(diag),
        Err(e) => {
            tracing::warn!(error = %e, "undecodable {CMTS_SUBNET_DIAGNOSTIC} result");
            None
        }
    }
}
