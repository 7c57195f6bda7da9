//! Configuration-text and comment scanning.
//!
//! LI support detection is a heuristic over fixed per-platform patterns.
//! A match on an explicit disable pattern is `absent`, a match on a service
//! pattern is `present`, and anything else is `unknown`.

use std::sync::LazyLock;

use iapfeed_common::{LiSupport, Vendor};
use regex::Regex;

static NOKIA_LI_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)mirror-dest\s+"LI_MIRROR".*?gateway\s*\{?\s*ip-address\s*\{?\s*source\s+(\d+\.\d+\.\d+\.\d+)"#,
    )
    .unwrap()
});

static XR_LI_DISABLED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*lawful-intercept\s+disable\b").unwrap());

static XR_LI_PRESENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*snmp-server\s+lawful-intercept\b").unwrap());

static JUNIPER_LI_PRESENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bflow-tap\b|\bdtcp\b").unwrap());

static OSS10_ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)OSS10[:\s]+([^\s,;]+)").unwrap());

/// Name of the configuration attribute holding the full text, per platform.
///
/// Returns `None` for platforms whose configuration is not scanned.
pub fn config_attribute(vendor: &Vendor) -> Option<&'static str> {
    match vendor {
        Vendor::NokiaSrosMd => Some("configurationAsfc"),
        Vendor::CiscoIosXr => Some("runningConfig"),
        Vendor::Juniper => Some("configuration"),
        _ => None,
    }
}

/// Scans configuration text for LI service support.
///
/// Returns `None` for platforms that are not scanned.
pub fn scan_li_support(vendor: &Vendor, config: &str) -> Option<LiSupport> {
    let support = match vendor {
        Vendor::NokiaSrosMd => {
            if NOKIA_LI_SOURCE.is_match(config) {
                LiSupport::Present
            } else {
                LiSupport::Unknown
            }
        }
        Vendor::CiscoIosXr => {
            if XR_LI_DISABLED.is_match(config) {
                LiSupport::Absent
            } else if XR_LI_PRESENT.is_match(config) {
                LiSupport::Present
            } else {
                LiSupport::Unknown
            }
        }
        Vendor::Juniper => {
            if JUNIPER_LI_PRESENT.is_match(config) {
                LiSupport::Present
            } else {
                LiSupport::Unknown
            }
        }
        _ => return None,
    };
    Some(support)
}

/// Extracts the LI mirror source address from Nokia configuration text.
pub fn extract_li_source(config: &str) -> Option<std::net::IpAddr> {
    NOKIA_LI_SOURCE
        .captures(config)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extracts the `OSS10: <hostname>` alias from device comments, uppercased.
pub fn extract_oss10_alias(comments: &str) -> Option<String> {
    OSS10_ALIAS
        .captures(comments)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_ascii_uppercase())
        .filter(|alias| !alias.is_empty())
}
