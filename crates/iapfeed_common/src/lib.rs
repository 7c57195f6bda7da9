//! Shared data model for the iapfeed pipeline.
//!
//! This crate provides the types every stage passes along: devices and their
//! interfaces, platform tags, device groups, CIDR-normalized subnets, scope
//! database rows, and the content hash used for cache keys.

#![warn(missing_docs)]

pub mod device;
pub mod hash;
pub mod scope;
pub mod subnet;
pub mod vendor;

pub use device::{Device, Interface, InterfaceAddress, LiSupport, LoopbackInterface};
pub use hash::ContentHash;
pub use scope::ScopeRecord;
pub use subnet::{sort_subnets, AddressFamily, InclusionReason, ParseSubnetError, Subnet};
pub use vendor::{DeviceGroup, ParseGroupError, Vendor};
