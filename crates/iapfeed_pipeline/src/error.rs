use std::path::PathBuf;

use iapfeed_common::DeviceGroup;
use thiserror::Error;

/// Errors raised by the pipeline driver.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Another run of the same group holds the lock.
    #[error("a run for group {group} is already in progress")]
    AlreadyRunning {
        /// The contended group.
        group: DeviceGroup,
    },

    /// The run was cancelled between stages.
    #[error("run cancelled")]
    Cancelled,

    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] iapfeed_config::ConfigError),

    /// Inventory fetch failed.
    #[error(transparent)]
    Inventory(#[from] iapfeed_inventory::InventoryError),

    /// Scope loading or reconciliation failed.
    #[error(transparent)]
    Reconcile(#[from] iapfeed_reconcile::ReconcileError),

    /// Building, validating or writing the artifact failed.
    #[error(transparent)]
    Artifact(#[from] iapfeed_artifact::ArtifactError),

    /// The upload handshake failed.
    #[error(transparent)]
    Upload(#[from] iapfeed_upload::UploadError),

    /// The status file could not be written or read.
    #[error("status file {}: {source}", path.display())]
    Status {
        /// Status file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The status snapshot could not be encoded or decoded.
    #[error("status snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {reason}")]
    Task {
        /// Join error text.
        reason: String,
    },
}
