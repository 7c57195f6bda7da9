use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building, validating or writing an artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The device's platform tag has no type code. Fatal for that device only.
    #[error("device {device}: platform '{tag}' has no type code")]
    UnmappedVendor {
        /// Device name.
        device: String,
        /// The unmapped platform tag.
        tag: String,
    },

    /// No device could be serialized.
    #[error("no device could be serialized")]
    Empty,

    /// The XML writer or reader failed.
    #[error("XML error: {reason}")]
    Xml {
        /// Underlying error text.
        reason: String,
    },

    /// The document does not have the expected structure.
    #[error("structural validation failed: {reason}")]
    Structure {
        /// What is wrong.
        reason: String,
    },

    /// `xmllint` rejected the document.
    #[error("schema validation against {} failed: {output}", schema.display())]
    Schema {
        /// Schema path.
        schema: PathBuf,
        /// Validator output.
        output: String,
    },

    /// An external tool could not be run.
    #[error("cannot run {tool}: {source}")]
    Tool {
        /// Executable name.
        tool: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
