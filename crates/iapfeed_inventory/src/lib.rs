//! Client for the device-management API.
//!
//! Produces normalized [`Device`](iapfeed_common::Device) records for a
//! device group: production filtering, loopback selection, subnet derivation,
//! vendor diagnostics and configuration scanning. Every upstream call goes
//! through the [`CacheStore`](iapfeed_cache::CacheStore) unless the caller
//! forces a refresh.

#![warn(missing_docs)]

pub mod api;
pub mod client;
pub mod diagnostics;
pub mod error;
pub mod loopback;
pub mod platform;
pub mod subnets;

pub use client::{
    DeviceSummary, DroppedDevice, GroupFetch, InventoryAuth, InventoryClient, InventorySettings,
};
pub use diagnostics::{extract_li_source, extract_oss10_alias, scan_li_support};
pub use error::InventoryError;
pub use loopback::select_loopback;
pub use subnets::derive_subnets;
