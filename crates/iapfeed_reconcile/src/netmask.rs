//! Netmask notations used by the scope database.

use std::net::{IpAddr, Ipv4Addr};

use crate::error::ReconcileError;

/// Converts a netmask to a prefix length for an address of the given family.
///
/// Accepted: dotted-decimal (`255.255.252.0`, IPv4 only), `/N` and `N`.
pub fn parse_prefix_len(netmask: &str, is_ipv4: bool) -> Result<u8, ReconcileError> {
    let mask = netmask.trim();
    let invalid = |reason: &str| ReconcileError::InvalidNetmask {
        netmask: netmask.to_string(),
        reason: reason.to_string(),
    };
    let max_len = if is_ipv4 { 32 } else { 128 };

    if mask.is_empty() {
        return Err(invalid("empty"));
    }
    if mask.contains('.') {
        if !is_ipv4 {
            return Err(invalid("dotted-decimal mask on an IPv6 network"));
        }
        let dotted: Ipv4Addr = mask
            .parse()
            .map_err(|_| invalid("not a dotted-decimal mask"))?;
        return ipnetwork::ipv4_mask_to_prefix(dotted).map_err(|_| invalid("non-contiguous mask"));
    }

    let digits = mask.strip_prefix('/').unwrap_or(mask);
    let len: u8 = digits
        .parse()
        .map_err(|_| invalid("not a prefix length"))?;
    if len > max_len {
        return Err(invalid(&format!("prefix longer than {max_len}")));
    }
    Ok(len)
}

/// Parses the network and netmask columns of a scope row.
///
/// A network column in CIDR form carries its own prefix and the netmask
/// column is ignored.
pub fn parse_scope_network(network: &str, netmask: &str) -> Result<(IpAddr, u8), ReconcileError> {
    let network = network.trim();
    let (addr_part, inline_len) = match network.split_once('/') {
        Some((a, l)) => (a, Some(l)),
        None => (network, None),
    };
    let address: IpAddr = addr_part
        .trim()
        .parse()
        .map_err(|_| ReconcileError::InvalidNetwork {
            network: network.to_string(),
        })?;
    let len = parse_prefix_len(inline_len.unwrap_or(netmask), address.is_ipv4())?;
    Ok((address, len))
}
