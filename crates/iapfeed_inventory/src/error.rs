use thiserror::Error;

/// Errors raised while talking to the device-management API.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The API rejected the credentials (HTTP 401/403). Fatal to the run.
    #[error("authentication rejected by {url} (HTTP {status})")]
    Auth {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The session login failed for a reason other than rejected
    /// credentials. Fatal to the run.
    #[error("inventory login at {url} failed: {reason}")]
    Login {
        /// Login URL.
        url: String,
        /// Transport error or response status.
        reason: String,
    },

    /// The request could not be sent or the response body not read.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Request URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status other than 401/403.
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// A response body did not decode into the expected record.
    #[error("cannot decode response from {url}: {reason}")]
    Decode {
        /// Request URL or cache key.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// Client settings are unusable.
    #[error("inventory client configuration: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },

    /// A per-device worker task panicked or was cancelled.
    #[error("device worker failed: {reason}")]
    Worker {
        /// Join error text.
        reason: String,
    },
}

impl InventoryError {
    /// Returns `true` for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            InventoryError::Auth { .. } | InventoryError::Login { .. }
        )
    }
}
