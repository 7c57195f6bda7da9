//! Subnet derivation from interfaces and the CMTS diagnostic.

use std::collections::BTreeMap;

use iapfeed_common::{sort_subnets, InclusionReason, Interface, Subnet};

use crate::api::CmtsSubnetDiagnostic;

/// Derives the subnets of a device.
///
/// Every address on a non-loopback interface contributes its network. For
/// CMTS devices the diagnostic subnets are merged in. Host routes are
/// ignored, duplicates collapse by CIDR text, and the result is sorted.
pub fn derive_subnets(
    owner: &str,
    interfaces: &[Interface],
    diagnostic: Option<&CmtsSubnetDiagnostic>,
) -> Vec<Subnet> {
    let mut by_cidr: BTreeMap<String, Subnet> = BTreeMap::new();

    for iface in interfaces.iter().filter(|i| !i.is_loopback()) {
        for a in &iface.addresses {
            match Subnet::new(a.address, a.prefix_len, owner, InclusionReason::Inventory) {
                Ok(subnet) => insert(&mut by_cidr, subnet),
                Err(e) => {
                    tracing::debug!(device = owner, interface = %iface.name, error = %e, "skipping address")
                }
            }
        }
    }

    if let Some(diag) = diagnostic {
        for cidr in diag.ipv4_subnets.iter().chain(&diag.ipv6_subnets) {
            match Subnet::parse(cidr, owner, InclusionReason::Inventory) {
                Ok(subnet) => insert(&mut by_cidr, subnet),
                Err(e) => tracing::warn!(device = owner, cidr = %cidr, error = %e, "bad diagnostic subnet"),
            }
        }
    }

    let mut subnets: Vec<Subnet> = by_cidr.into_values().collect();
    sort_subnets(&mut subnets);
    subnets
}

fn insert(by_cidr: &mut BTreeMap<String, Subnet>, subnet: Subnet) {
    if subnet.is_host_route() {
        return;
    }
    by_cidr.entry(subnet.cidr()).or_insert(subnet);
}
