//! Closed tables: platform type codes and per-device quirks.

use iapfeed_common::{Device, DeviceGroup, LiSupport, Vendor};

use crate::error::ArtifactError;

/// Quirk token for CCAP1 CMTS devices.
pub const CCAP1_QUIRK: &str = "1:m";

/// Returns the numeric `type` code of a platform.
pub fn type_code(device: &str, vendor: &Vendor) -> Result<u32, ArtifactError> {
    match vendor {
        Vendor::Juniper => Ok(1),
        Vendor::CiscoIosXr => Ok(18),
        Vendor::NokiaSrosMd => Ok(65),
        Vendor::CiscoCbr8 | Vendor::CasaCmts | Vendor::ArrisE6000 => Ok(18),
        Vendor::Unrecognized(tag) => Err(ArtifactError::UnmappedVendor {
            device: device.to_string(),
            tag: tag.clone(),
        }),
    }
}

/// Quirk tokens of a device, in output order.
///
/// CMTS names containing `CCAP1` get `1:m`. A scanned platform without
/// confirmed LI support gets `li:absent` or `li:unknown`.
pub fn quirks(device: &Device) -> Vec<&'static str> {
    let mut tokens = Vec::new();
    if device.group == DeviceGroup::Cmts && device.name.to_ascii_uppercase().contains("CCAP1") {
        tokens.push(CCAP1_QUIRK);
    }
    match device.li_support {
        Some(LiSupport::Absent) => tokens.push("li:absent"),
        Some(LiSupport::Unknown) => tokens.push("li:unknown"),
        Some(LiSupport::Present) | None => {}
    }
    tokens
}
