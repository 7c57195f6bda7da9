//! Merging of inventory subnets with scope database rows.

use std::collections::{BTreeMap, HashMap, HashSet};

use iapfeed_common::{sort_subnets, Device, InclusionReason, ScopeRecord, Subnet};
use iapfeed_config::ReconcileConfig;

use crate::error::ReconcileError;
use crate::netmask::parse_scope_network;

/// Reconciliation policy.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePolicy {
    /// Drop private and otherwise non-routable subnets.
    pub exclude_non_public: bool,
    /// Inventory hostname to scope hostname, both uppercased.
    pub aliases: BTreeMap<String, String>,
}

impl ReconcilePolicy {
    /// Builds the policy from configuration.
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            exclude_non_public: config.exclude_non_public,
            aliases: config
                .aliases
                .iter()
                .map(|(k, v)| (Device::normalize_name(k), Device::normalize_name(v)))
                .collect(),
        }
    }
}

/// A device with its reconciled subnet list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledDevice {
    /// The device as fetched.
    pub device: Device,
    /// Deduplicated union of interface and scope subnets, in artifact order.
    pub subnets: Vec<Subnet>,
    /// Scope rows matched on hostname and interface.
    pub strong_matches: usize,
    /// Scope rows matched on hostname only.
    pub weak_matches: usize,
}

/// A scope row that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// Hostname column.
    pub hostname: String,
    /// Network column.
    pub network: String,
    /// Netmask column.
    pub netmask: String,
    /// Why the row was skipped.
    pub reason: String,
}

/// Outcome of reconciling one group.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Devices in input order.
    pub devices: Vec<ReconciledDevice>,
    /// Rows skipped for bad network or netmask data.
    pub skipped_rows: Vec<SkippedRow>,
    /// Inactive rows ignored.
    pub inactive_rows: usize,
    /// Valid rows whose hostname matched no device.
    pub unmatched_rows: usize,
}

struct ParsedRow<'a> {
    record: &'a ScopeRecord,
    subnet: Subnet,
}

/// Cross-references devices against scope rows.
#[derive(Debug, Clone, Default)]
pub struct SubnetReconciler {
    policy: ReconcilePolicy,
}

impl SubnetReconciler {
    /// Creates a reconciler with the given policy.
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    /// Reconciles every device against the scope rows.
    ///
    /// Rows with an unparseable network or netmask are skipped with a
    /// warning and reported; they never fail the call.
    pub fn reconcile(&self, devices: Vec<Device>, rows: &[ScopeRecord]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut by_host: HashMap<String, Vec<ParsedRow<'_>>> = HashMap::new();

        for record in rows {
            if !record.active {
                report.inactive_rows += 1;
                continue;
            }
            let host = Device::normalize_name(&record.hostname);
            match parse_scope_network(&record.network, &record.netmask)
                .and_then(|(addr, len)| {
                    Subnet::new(addr, len, host.clone(), InclusionReason::ScopeDb).map_err(|e| {
                        ReconcileError::InvalidNetmask {
                            netmask: record.netmask.clone(),
                            reason: e.to_string(),
                        }
                    })
                }) {
                Ok(subnet) => by_host.entry(host).or_default().push(ParsedRow { record, subnet }),
                Err(e) => {
                    tracing::warn!(
                        hostname = %record.hostname,
                        network = %record.network,
                        netmask = %record.netmask,
                        error = %e,
                        "skipping scope row"
                    );
                    report.skipped_rows.push(SkippedRow {
                        hostname: record.hostname.clone(),
                        network: record.network.clone(),
                        netmask: record.netmask.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut matched_hosts: HashSet<String> = HashSet::new();
        for device in devices {
            let host = self.lookup_name(&device);
            let matched: Vec<&ParsedRow<'_>> = by_host.get(&host).into_iter().flatten().collect();
            if !matched.is_empty() {
                matched_hosts.insert(host);
            }
            report.devices.push(self.merge(device, &matched));
        }

        report.unmatched_rows = by_host
            .iter()
            .filter(|(host, _)| !matched_hosts.contains(*host))
            .map(|(host, rows)| {
                tracing::debug!(hostname = %host, rows = rows.len(), "scope rows match no device");
                rows.len()
            })
            .sum();

        tracing::info!(
            devices = report.devices.len(),
            skipped_rows = report.skipped_rows.len(),
            unmatched_rows = report.unmatched_rows,
            "reconciled subnets"
        );
        report
    }

    /// The one hostname scope rows are looked up under.
    ///
    /// Priority: configured alias, then the OSS10 alias from the device
    /// comments, then the inventory name.
    fn lookup_name(&self, device: &Device) -> String {
        if let Some(alias) = self.policy.aliases.get(&device.name) {
            return alias.clone();
        }
        match &device.alias {
            Some(alias) => Device::normalize_name(alias),
            None => device.name.clone(),
        }
    }

    fn merge(&self, device: Device, rows: &[&ParsedRow<'_>]) -> ReconciledDevice {
        let mut by_cidr: BTreeMap<String, Subnet> = device
            .subnets
            .iter()
            .map(|s| (s.cidr(), s.clone()))
            .collect();
        let mut strong = 0;
        let mut weak = 0;

        for row in rows {
            let is_strong = row
                .record
                .interface
                .as_deref()
                .is_some_and(|iface| device.has_interface(iface));
            if is_strong {
                strong += 1;
            } else {
                weak += 1;
                tracing::debug!(
                    device = %device.name,
                    subnet = %row.subnet,
                    interface = row.record.interface.as_deref().unwrap_or("-"),
                    "weak scope match"
                );
            }

            by_cidr
                .entry(row.subnet.cidr())
                .and_modify(|s| s.reason = s.reason.merge(InclusionReason::ScopeDb))
                .or_insert_with(|| {
                    let mut subnet = row.subnet.clone();
                    subnet.owner = device.name.clone();
                    subnet
                });
        }

        let mut subnets: Vec<Subnet> = by_cidr
            .into_values()
            .filter(|s| !self.policy.exclude_non_public || s.is_public())
            .collect();
        sort_subnets(&mut subnets);

        ReconciledDevice {
            device,
            subnets,
            strong_matches: strong,
            weak_matches: weak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iapfeed_common::{DeviceGroup, Interface, InterfaceAddress, Vendor};

    fn device(name: &str, iface: &str, cidr: Option<&str>) -> Device {
        let subnets = cidr
            .map(|c| vec![Subnet::parse(c, name, InclusionReason::Inventory).unwrap()])
            .unwrap_or_default();
        Device {
            id: 1,
            name: name.to_string(),
            vendor: Vendor::CiscoCbr8,
            in_production: true,
            group: DeviceGroup::Cmts,
            loopback: None,
            interfaces: vec![Interface {
                index: 1,
                name: iface.to_string(),
                addresses: vec![InterfaceAddress {
                    address: "172.16.1.1".parse().unwrap(),
                    prefix_len: 22,
                }],
            }],
            subnets,
            alias: None,
            li_support: None,
        }
    }

    fn row(host: &str, iface: Option<&str>, network: &str, netmask: &str) -> ScopeRecord {
        ScopeRecord {
            network: network.to_string(),
            netmask: netmask.to_string(),
            hostname: host.to_string(),
            interface: iface.map(str::to_string),
            vlan: None,
            active: true,
        }
    }

    fn cidrs(d: &ReconciledDevice) -> Vec<String> {
        d.subnets.iter().map(Subnet::cidr).collect()
    }

    #[test]
    fn cmts_ams_01_scope_match_collapses() {
        let devices = vec![device("CMTS-AMS-01", "Gi0/0/0", Some("172.16.0.0/22"))];
        let rows = vec![row("cmts-ams-01", Some("Gi0/0/0"), "172.16.0.0", "255.255.252.0")];
        let report = SubnetReconciler::default().reconcile(devices, &rows);
        let d = &report.devices[0];
        assert_eq!(cidrs(d), vec!["172.16.0.0/22"]);
        assert_eq!(d.subnets[0].reason, InclusionReason::Both);
        assert_eq!(d.strong_matches, 1);
        assert_eq!(d.weak_matches, 0);
    }

    #[test]
    fn scope_only_subnet_added() {
        let devices = vec![device("CMTS-AMS-01", "Gi0/0/0", None)];
        let rows = vec![row("CMTS-AMS-01", None, "84.24.0.0", "/22")];
        let report = SubnetReconciler::default().reconcile(devices, &rows);
        let d = &report.devices[0];
        assert_eq!(cidrs(d), vec!["84.24.0.0/22"]);
        assert_eq!(d.subnets[0].reason, InclusionReason::ScopeDb);
        assert_eq!(d.subnets[0].owner, "CMTS-AMS-01");
        assert_eq!(d.weak_matches, 1);
    }

    #[test]
    fn unknown_row_interface_is_weak() {
        let devices = vec![device("CMTS-AMS-01", "Gi0/0/0", None)];
        let rows = vec![row("cmts-ams-01", Some("Gi9/9/9"), "84.24.0.0", "22")];
        let report = SubnetReconciler::default().reconcile(devices, &rows);
        assert_eq!(report.devices[0].weak_matches, 1);
        assert_eq!(report.devices[0].strong_matches, 0);
    }

    #[test]
    fn invalid_netmask_row_skipped() {
        let devices = vec![device("CMTS-AMS-01", "Gi0/0/0", None)];
        let rows = vec![
            row("cmts-ams-01", None, "84.24.0.0", "255.255.255.255.0"),
            row("cmts-ams-01", None, "84.25.0.0", "255.255.255.0"),
        ];
        let report = SubnetReconciler::default().reconcile(devices, &rows);
        assert_eq!(report.skipped_rows.len(), 1);
        assert_eq!(report.skipped_rows[0].netmask, "255.255.255.255.0");
        assert_eq!(cidrs(&report.devices[0]), vec!["84.25.0.0/24"]);
    }

    #[test]
    fn inactive_and_unmatched_rows_counted() {
        let devices = vec![device("CMTS-AMS-01", "Gi0/0/0", None)];
        let mut inactive = row("cmts-ams-01", None, "84.24.0.0", "22");
        inactive.active = false;
        let rows = vec![inactive, row("cmts-rtd-02", None, "84.26.0.0", "22")];
        let report = SubnetReconciler::default().reconcile(devices, &rows);
        assert_eq!(report.inactive_rows, 1);
        assert_eq!(report.unmatched_rows, 1);
        assert!(report.devices[0].subnets.is_empty());
    }

    #[test]
    fn config_alias_matches() {
        let mut aliases = BTreeMap::new();
        aliases.insert("CMTS-AMS-01".to_string(), "AMS-CMTS-1".to_string());
        let reconciler = SubnetReconciler::new(ReconcilePolicy {
            exclude_non_public: false,
            aliases,
        });
        let devices = vec![device("CMTS-AMS-01", "Gi0/0/0", None)];
        let rows = vec![row("ams-cmts-1", None, "84.24.0.0", "22")];
        let report = reconciler.reconcile(devices, &rows);
        assert_eq!(cidrs(&report.devices[0]), vec!["84.24.0.0/22"]);
    }

    #[test]
    fn oss10_alias_matches() {
        let mut d = device("CMTS-AMS-01", "Gi0/0/0", None);
        d.alias = Some("CMTS-AMS-01A".to_string());
        let rows = vec![row("cmts-ams-01a", None, "84.24.0.0", "22")];
        let report = SubnetReconciler::default().reconcile(vec![d], &rows);
        assert_eq!(cidrs(&report.devices[0]), vec!["84.24.0.0/22"]);
        assert_eq!(report.unmatched_rows, 0);
    }

    #[test]
    fn alias_rows_replace_direct_name_rows() {
        let mut d = device("CMTS-AMS-01", "Gi0/0/0", None);
        d.alias = Some("cmts-ams-01a".to_string());
        let rows = vec![
            row("cmts-ams-01", None, "84.24.0.0", "22"),
            row("cmts-ams-01a", None, "84.25.0.0", "22"),
        ];
        let report = SubnetReconciler::default().reconcile(vec![d], &rows);
        assert_eq!(cidrs(&report.devices[0]), vec!["84.25.0.0/22"]);
        assert_eq!(report.devices[0].weak_matches, 1);
        assert_eq!(report.unmatched_rows, 1);
    }

    #[test]
    fn config_alias_outranks_oss10_alias() {
        let mut aliases = BTreeMap::new();
        aliases.insert("CMTS-AMS-01".to_string(), "AMS-CMTS-1".to_string());
        let reconciler = SubnetReconciler::new(ReconcilePolicy {
            exclude_non_public: false,
            aliases,
        });
        let mut d = device("CMTS-AMS-01", "Gi0/0/0", None);
        d.alias = Some("CMTS-AMS-01A".to_string());
        let rows = vec![
            row("cmts-ams-01a", None, "84.25.0.0", "22"),
            row("ams-cmts-1", None, "84.24.0.0", "22"),
        ];
        let report = reconciler.reconcile(vec![d], &rows);
        assert_eq!(cidrs(&report.devices[0]), vec!["84.24.0.0/22"]);
    }

    #[test]
    fn non_public_filter() {
        let reconciler = SubnetReconciler::new(ReconcilePolicy {
            exclude_non_public: true,
            aliases: BTreeMap::new(),
        });
        let devices = vec![device("CMTS-AMS-01", "Gi0/0/0", Some("172.16.0.0/22"))];
        let rows = vec![
            row("cmts-ams-01", None, "84.24.0.0", "22"),
            row("cmts-ams-01", None, "fd00:1::/48", ""),
            row("cmts-ams-01", None, "2a02:a400::/40", ""),
        ];
        let report = reconciler.reconcile(devices, &rows);
        assert_eq!(
            cidrs(&report.devices[0]),
            vec!["84.24.0.0/22", "2a02:a400::/40"]
        );
    }

    #[test]
    fn ordering_v4_before_v6() {
        let devices = vec![device("R1", "Gi0/0/0", Some("2001:db8::/32"))];
        let rows = vec![
            row("r1", None, "84.24.4.0", "24"),
            row("r1", None, "84.24.0.0", "22"),
            row("r1", None, "84.24.0.0", "24"),
        ];
        let report = SubnetReconciler::default().reconcile(devices, &rows);
        assert_eq!(
            cidrs(&report.devices[0]),
            vec!["84.24.0.0/22", "84.24.0.0/24", "84.24.4.0/24", "2001:db8::/32"]
        );
    }

    #[test]
    fn policy_from_config_normalizes_aliases() {
        let mut config = ReconcileConfig::default();
        config
            .aliases
            .insert("cmts-ams-01".to_string(), " ams-cmts-1 ".to_string());
        let policy = ReconcilePolicy::from_config(&config);
        assert_eq!(policy.aliases.get("CMTS-AMS-01").unwrap(), "AMS-CMTS-1");
    }
}
