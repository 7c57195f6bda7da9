//! Mapping of upstream family strings to platform tags.

use iapfeed_common::{DeviceGroup, Vendor};

/// Family substrings (lowercase) and the platform they identify, checked in order.
const FAMILY_TABLE: &[(&str, Vendor)] = &[
    ("ios-xr", Vendor::CiscoIosXr),
    ("iosxr", Vendor::CiscoIosXr),
    ("cbr", Vendor::CiscoCbr8),
    ("junos", Vendor::Juniper),
    ("juniper", Vendor::Juniper),
    ("sr os", Vendor::NokiaSrosMd),
    ("sros", Vendor::NokiaSrosMd),
    ("timos", Vendor::NokiaSrosMd),
    ("nokia", Vendor::NokiaSrosMd),
    ("casa", Vendor::CasaCmts),
    ("e6000", Vendor::ArrisE6000),
    ("arris", Vendor::ArrisE6000),
    ("commscope", Vendor::ArrisE6000),
];

/// Derives the platform tag from an upstream family string.
///
/// Cisco IOS/IOS-XE in the CMTS group is a cBR-8. Families outside the table
/// become [`Vendor::Unrecognized`] carrying a slug of the family.
pub fn vendor_for_family(family: &str, group: DeviceGroup) -> Vendor {
    let lower = family.to_ascii_lowercase();
    if let Some((_, vendor)) = FAMILY_TABLE.iter().find(|(needle, _)| lower.contains(needle)) {
        return vendor.clone();
    }
    if group == DeviceGroup::Cmts && lower.contains("ios") {
        return Vendor::CiscoCbr8;
    }
    Vendor::Unrecognized(slug(family))
}

/// Maps the vendor string of the CMTS subnet diagnostic to a platform.
///
/// Returns `None` for strings that do not name a CMTS platform, in which
/// case the family-derived tag stands.
pub fn vendor_for_diagnostic(vendor: &str) -> Option<Vendor> {
    let lower = vendor.to_ascii_lowercase();
    if lower.contains("cbr") || lower.contains("ios") {
        Some(Vendor::CiscoCbr8)
    } else if lower.contains("casa") {
        Some(Vendor::CasaCmts)
    } else if lower.contains("arris") || lower.contains("e6000") || lower.contains("commscope") {
        Some(Vendor::ArrisE6000)
    } else {
        None
    }
}

/// Lowercase, hyphen-separated form of a free-text family name.
fn slug(family: &str) -> String {
    let words: Vec<String> = family
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    if words.is_empty() {
        "unknown".to_string()
    } else {
        words.join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_families() {
        assert_eq!(
            vendor_for_family("Cisco IOS-XR", DeviceGroup::Pe),
            Vendor::CiscoIosXr
        );
        assert_eq!(
            vendor_for_family("Juniper Junos", DeviceGroup::Pe),
            Vendor::Juniper
        );
        assert_eq!(
            vendor_for_family("Nokia SR OS (MD-CLI)", DeviceGroup::Pe),
            Vendor::NokiaSrosMd
        );
    }

    #[test]
    fn cmts_families() {
        assert_eq!(
            vendor_for_family("Casa CMTS", DeviceGroup::Cmts),
            Vendor::CasaCmts
        );
        assert_eq!(
            vendor_for_family("Cisco IOS and IOS-XE", DeviceGroup::Cmts),
            Vendor::CiscoCbr8
        );
        assert_eq!(
            vendor_for_family("Arris E6000", DeviceGroup::Cmts),
            Vendor::ArrisE6000
        );
    }

    #[test]
    fn ios_outside_cmts_group_is_unrecognized() {
        let v = vendor_for_family("Cisco IOS and IOS-XE", DeviceGroup::Pe);
        assert_eq!(v, Vendor::Unrecognized("cisco-ios-and-ios-xe".to_string()));
    }

    #[test]
    fn unknown_family_is_slugged() {
        assert_eq!(
            vendor_for_family("Foo OS", DeviceGroup::Pe),
            Vendor::Unrecognized("foo-os".to_string())
        );
        assert_eq!(
            vendor_for_family("", DeviceGroup::Pe),
            Vendor::Unrecognized("unknown".to_string())
        );
    }

    #[test]
    fn diagnostic_vendor_strings() {
        assert_eq!(
            vendor_for_diagnostic("Cisco IOS/IOS-XE"),
            Some(Vendor::CiscoCbr8)
        );
        assert_eq!(vendor_for_diagnostic("Casa"), Some(Vendor::CasaCmts));
        assert_eq!(vendor_for_diagnostic("Unknown"), None);
    }
}
