//! Serialization of reconciled devices into the `iaps` XML dialect.
//!
//! [`ArtifactBuilder`] renders a deterministic document, [`validate`]
//! re-parses it structurally (and optionally through `xmllint`), and
//! [`output`] names, writes and compresses the artifact files.

#![warn(missing_docs)]

pub mod codes;
pub mod error;
pub mod output;
pub mod validate;
pub mod writer;

pub use codes::{quirks, type_code};
pub use error::ArtifactError;
pub use output::{artifact_file_name, compress, write_artifact};
pub use validate::{run_xmllint, validate_structure, ValidationSummary};
pub use writer::{ArtifactBuilder, BuildOptions, BuiltDocument, RejectedDevice};
