//! Cross-referencing of device subnets against the scope database.
//!
//! [`SubnetReconciler`] is pure and in-memory: it takes the inventory's
//! devices and the scope rows loaded through a [`ScopeSource`], and returns
//! each device with a merged, deduplicated and ordered subnet list.

#![warn(missing_docs)]

pub mod error;
pub mod netmask;
pub mod reconciler;
pub mod scope_source;

pub use error::ReconcileError;
pub use netmask::{parse_prefix_len, parse_scope_network};
pub use reconciler::{ReconcilePolicy, ReconcileReport, ReconciledDevice, SkippedRow, SubnetReconciler};
pub use scope_source::{MySqlScopeSource, ScopeSource, StaticScopeSource};
