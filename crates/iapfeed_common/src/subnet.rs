//! CIDR-normalized subnets.

use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

/// Which source(s) a subnet came from. Kept for audit and debugging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InclusionReason {
    /// Derived from the inventory (interfaces or diagnostics).
    Inventory,
    /// Supplied by a scope database row.
    ScopeDb,
    /// Reported by both sources.
    Both,
}

impl InclusionReason {
    /// Combines the reasons of two sightings of the same subnet.
    pub fn merge(self, other: InclusionReason) -> InclusionReason {
        if self == other {
            self
        } else {
            InclusionReason::Both
        }
    }
}

/// Error returned when a subnet cannot be built from its parts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseSubnetError {
    /// The address part is not an IP address.
    #[error("invalid address '{input}'")]
    InvalidAddress {
        /// The rejected input.
        input: String,
    },

    /// The prefix length is out of range for the address family.
    #[error("invalid prefix length {prefix_len} for {address}")]
    InvalidPrefix {
        /// The network address.
        address: IpAddr,
        /// The rejected prefix length.
        prefix_len: u8,
    },
}

/// A network/prefix pair with host bits cleared, owned (by name) by one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: IpNetwork,
    /// Name of the device the subnet belongs to.
    pub owner: String,
    /// Where the subnet came from.
    pub reason: InclusionReason,
}

impl Subnet {
    /// Builds a subnet from an address and prefix length, clearing host bits.
    ///
    /// `10.254.216.1` with prefix 24 becomes `10.254.216.0/24`.
    pub fn new(
        address: IpAddr,
        prefix_len: u8,
        owner: impl Into<String>,
        reason: InclusionReason,
    ) -> Result<Self, ParseSubnetError> {
        let invalid = || ParseSubnetError::InvalidPrefix {
            address,
            prefix_len,
        };
        let raw = IpNetwork::new(address, prefix_len).map_err(|_| invalid())?;
        let network = IpNetwork::new(raw.network(), prefix_len).map_err(|_| invalid())?;
        Ok(Self {
            network,
            owner: owner.into(),
            reason,
        })
    }

    /// Parses `address/prefix` notation. Host bits are allowed and cleared.
    /// A bare address is treated as a host route.
    pub fn parse(
        cidr: &str,
        owner: impl Into<String>,
        reason: InclusionReason,
    ) -> Result<Self, ParseSubnetError> {
        let cidr = cidr.trim();
        let (addr_part, prefix_part) = match cidr.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (cidr, None),
        };
        let address: IpAddr = addr_part
            .trim()
            .parse()
            .map_err(|_| ParseSubnetError::InvalidAddress {
                input: cidr.to_string(),
            })?;
        let prefix_len = match prefix_part {
            Some(p) => p
                .trim()
                .parse::<u8>()
                .map_err(|_| ParseSubnetError::InvalidAddress {
                    input: cidr.to_string(),
                })?,
            None => max_prefix(address),
        };
        Self::new(address, prefix_len, owner, reason)
    }

    /// Returns the normalized network.
    pub fn network(&self) -> IpNetwork {
        self.network
    }

    /// Returns the network address.
    pub fn address(&self) -> IpAddr {
        self.network.network()
    }

    /// Returns the prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.network.prefix()
    }

    /// Returns the address family.
    pub fn family(&self) -> AddressFamily {
        match self.network {
            IpNetwork::V4(_) => AddressFamily::V4,
            IpNetwork::V6(_) => AddressFamily::V6,
        }
    }

    /// Returns the canonical `network/prefix` string used for deduplication.
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address(), self.prefix_len())
    }

    /// Returns `true` for /32 and /128 networks.
    pub fn is_host_route(&self) -> bool {
        self.prefix_len() == max_prefix(self.address())
    }

    /// Returns `true` unless the subnet lies inside a private, loopback,
    /// link-local, multicast, documentation, benchmarking or otherwise
    /// reserved block.
    pub fn is_public(&self) -> bool {
        let prefix = self.prefix_len();
        match self.address() {
            IpAddr::V4(addr) => {
                let bits = u32::from(addr);
                !NON_PUBLIC_V4
                    .iter()
                    .any(|&(block, len)| prefix >= len && mask_v4(bits, len) == block)
            }
            IpAddr::V6(addr) => {
                let bits = u128::from(addr);
                !NON_PUBLIC_V6
                    .iter()
                    .any(|&(block, len)| prefix >= len && mask_v6(bits, len) == block)
            }
        }
    }

    /// Ordering key: IPv4 before IPv6, then numeric address, then prefix.
    pub fn sort_key(&self) -> (AddressFamily, u128, u8) {
        let numeric = match self.address() {
            IpAddr::V4(a) => u128::from(u32::from(a)),
            IpAddr::V6(a) => u128::from(a),
        };
        (self.family(), numeric, self.prefix_len())
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address(), self.prefix_len())
    }
}

/// Sorts subnets into the stable artifact order.
pub fn sort_subnets(subnets: &mut [Subnet]) {
    subnets.sort_by_key(|s| s.sort_key());
}

fn max_prefix(address: IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask_v4(bits: u32, len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        bits & (u32::MAX << (32 - u32::from(len)))
    }
}

fn mask_v6(bits: u128, len: u8) -> u128 {
    if len == 0 {
        0
    } else {
        bits & (u128::MAX << (128 - u32::from(len)))
    }
}

/// Non-routable IPv4 blocks as `(network, prefix)`.
const NON_PUBLIC_V4: &[(u32, u8)] = &[
    (0x0000_0000, 8),  // 0.0.0.0/8
    (0x0A00_0000, 8),  // 10.0.0.0/8
    (0x6440_0000, 10), // 100.64.0.0/10
    (0x7F00_0000, 8),  // 127.0.0.0/8
    (0xA9FE_0000, 16), // 169.254.0.0/16
    (0xAC10_0000, 12), // 172.16.0.0/12
    (0xC000_0000, 24), // 192.0.0.0/24
    (0xC000_0200, 24), // 192.0.2.0/24
    (0xC0A8_0000, 16), // 192.168.0.0/16
    (0xC612_0000, 15), // 198.18.0.0/15
    (0xC633_6400, 24), // 198.51.100.0/24
    (0xCB00_7100, 24), // 203.0.113.0/24
    (0xE000_0000, 4),  // 224.0.0.0/4
    (0xF000_0000, 4),  // 240.0.0.0/4
];

/// Non-routable IPv6 blocks as `(network, prefix)`.
const NON_PUBLIC_V6: &[(u128, u8)] = &[
    (0, 128),                                          // ::/128
    (1, 128),                                          // ::1/128
    (0x0000_0000_0000_0000_0000_ffff_0000_0000, 96),   // ::ffff:0:0/96
    (0x0100_0000_0000_0000_0000_0000_0000_0000, 64),   // 100::/64
    (0x2001_0db8_0000_0000_0000_0000_0000_0000, 32),   // 2001:db8::/32
    (0xfc00_0000_0000_0000_0000_0000_0000_0000, 7),    // fc00::/7
    (0xfe80_0000_0000_0000_0000_0000_0000_0000, 10),   // fe80::/10
    (0xff00_0000_0000_0000_0000_0000_0000_0000, 8),    // ff00::/8
];

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(cidr: &str) -> Subnet {
        Subnet::parse(cidr, "R1", InclusionReason::Inventory).unwrap()
    }

    #[test]
    fn host_bits_are_cleared() {
        let s = inv("10.254.216.1/24");
        assert_eq!(s.cidr(), "10.254.216.0/24");
        assert_eq!(s.family(), AddressFamily::V4);
    }

    #[test]
    fn ipv6_is_normalized() {
        let s = inv("2001:db8:0:0:1::1/32");
        assert_eq!(s.cidr(), "2001:db8::/32");
        assert_eq!(s.family(), AddressFamily::V6);
    }

    #[test]
    fn bare_address_is_host_route() {
        let s = inv("192.0.2.7");
        assert_eq!(s.prefix_len(), 32);
        assert!(s.is_host_route());
    }

    #[test]
    fn bad_prefix_is_rejected() {
        let err = Subnet::parse("10.0.0.0/33", "R1", InclusionReason::Inventory).unwrap_err();
        assert!(matches!(err, ParseSubnetError::InvalidPrefix { .. }));
        let err = Subnet::parse("10.0.0.0/x", "R1", InclusionReason::Inventory).unwrap_err();
        assert!(matches!(err, ParseSubnetError::InvalidAddress { .. }));
        let err = Subnet::parse("not-an-ip/8", "R1", InclusionReason::Inventory).unwrap_err();
        assert!(err.to_string().contains("not-an-ip"));
    }

    #[test]
    fn private_ranges_are_not_public() {
        assert!(!inv("10.1.0.0/16").is_public());
        assert!(!inv("172.16.0.0/22").is_public());
        assert!(!inv("192.168.1.0/24").is_public());
        assert!(!inv("198.18.4.0/24").is_public());
        assert!(!inv("fd00:1::/48").is_public());
        assert!(!inv("fe80::/64").is_public());
        assert!(!inv("2001:db8::/32").is_public());
    }

    #[test]
    fn routable_ranges_are_public() {
        assert!(inv("213.51.0.0/16").is_public());
        assert!(inv("84.24.0.0/14").is_public());
        assert!(inv("2a02:a400::/26").is_public());
        // A supernet of a private block is not itself private.
        assert!(inv("172.0.0.0/8").is_public());
    }

    #[test]
    fn sorting_puts_v4_first_then_numeric() {
        let mut subnets = vec![
            inv("2a02:a400::/26"),
            inv("10.2.0.0/16"),
            inv("10.10.0.0/16"),
            inv("10.2.0.0/15"),
        ];
        sort_subnets(&mut subnets);
        let order: Vec<String> = subnets.iter().map(Subnet::cidr).collect();
        assert_eq!(
            order,
            vec!["10.2.0.0/15", "10.2.0.0/16", "10.10.0.0/16", "2a02:a400::/26"]
        );
    }

    #[test]
    fn reason_merge() {
        use InclusionReason::*;
        assert_eq!(Inventory.merge(Inventory), Inventory);
        assert_eq!(Inventory.merge(ScopeDb), Both);
        assert_eq!(Both.merge(ScopeDb), Both);
    }
}
