//! Client for the LI platform's XML import endpoint.
//!
//! An [`UploadSession`] owns its HTTP client and cookie jar. It logs in,
//! picks up the CSRF token the login sets, and posts the artifact to the
//! import action.

#![warn(missing_docs)]

pub mod error;
pub mod session;

pub use error::UploadError;
pub use session::{escape_xml_payload, ImportOutcome, UploadSession, UploadSettings};
