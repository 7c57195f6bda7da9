//! Interface normalization and loopback selection.

use std::net::IpAddr;

use iapfeed_common::{Interface, InterfaceAddress, LoopbackInterface, Subnet};

use crate::api::{RawAddress, RawInterface};

/// Hostname fragments of devices whose LI loopback is `Loopback7`.
const LOOPBACK7_MARKERS: &[&str] = &["CCAP1", "CBR", "CASA"];

/// Converts wire interfaces into normalized records.
///
/// The interface index is the upstream id when present, otherwise the
/// position in the list. Unparseable addresses are dropped.
pub fn interfaces_from_raw(raw: Vec<RawInterface>) -> Vec<Interface> {
    raw.into_iter()
        .enumerate()
        .map(|(position, r)| {
            let index = r
                .id
                .and_then(|id| u32::try_from(id).ok())
                .unwrap_or(position as u32);
            let mut addresses = Vec::new();
            for a in &r.ip4_addresses {
                push_address(&mut addresses, a, 32, &r.name);
            }
            if let Some(legacy) = r.ip_address.as_deref() {
                push_legacy(&mut addresses, legacy, &r.name);
            }
            for a in &r.ip6_addresses {
                push_address(&mut addresses, a, 128, &r.name);
            }
            Interface {
                index,
                name: r.name,
                addresses,
            }
        })
        .collect()
}

fn push_address(out: &mut Vec<InterfaceAddress>, raw: &RawAddress, default_len: u8, iface: &str) {
    match raw.ip.trim().parse::<IpAddr>() {
        Ok(address) => out.push(InterfaceAddress {
            address,
            prefix_len: raw.prefix_length.unwrap_or(default_len),
        }),
        Err(_) => tracing::debug!(interface = iface, ip = %raw.ip, "skipping unparseable address"),
    }
}

fn push_legacy(out: &mut Vec<InterfaceAddress>, legacy: &str, iface: &str) {
    let (addr, len) = match legacy.split_once('/') {
        Some((a, l)) => (a, l.trim().parse::<u8>().ok()),
        None => (legacy, None),
    };
    let Ok(address) = addr.trim().parse::<IpAddr>() else {
        tracing::debug!(interface = iface, ip = legacy, "skipping unparseable address");
        return;
    };
    if out.iter().any(|a| a.address == address) {
        return;
    }
    let default_len = if address.is_ipv4() { 32 } else { 128 };
    out.push(InterfaceAddress {
        address,
        prefix_len: len.unwrap_or(default_len),
    });
}

/// Chooses the loopback address of a device.
///
/// Candidates are loopback-type interfaces with an IPv4 address. Ranking,
/// first difference wins:
/// 1. address inside `preferred_range`;
/// 2. loopback number 7 on Casa/CCAP1/CBR devices, 0 elsewhere;
/// 3. lowest interface index;
/// 4. interface name.
pub fn select_loopback(
    device_name: &str,
    interfaces: &[Interface],
    preferred_range: Option<&Subnet>,
) -> Option<LoopbackInterface> {
    let upper = device_name.to_ascii_uppercase();
    let preferred_number = if LOOPBACK7_MARKERS.iter().any(|m| upper.contains(m)) {
        7
    } else {
        0
    };

    interfaces
        .iter()
        .filter(|i| i.is_loopback())
        .filter_map(|i| i.first_ipv4().map(|addr| (i, addr)))
        .min_by_key(|(iface, addr)| {
            let in_range = preferred_range.is_some_and(|r| r.network().contains(*addr));
            let number_match = loopback_number(&iface.name) == Some(preferred_number);
            (!in_range, !number_match, iface.index, iface.name.clone())
        })
        .map(|(iface, address)| LoopbackInterface {
            address,
            index: iface.index,
            name: iface.name.clone(),
        })
}

/// First run of digits in an interface name: `Loopback7` is 7, `lo0.0` is 0.
fn loopback_number(name: &str) -> Option<u32> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
