use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the upload handshake.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The login request was rejected.
    #[error("login to {url} failed with HTTP {status}")]
    Login {
        /// Login URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The login succeeded but set no `csrftoken` cookie.
    #[error("login to {url} set no csrftoken cookie")]
    MissingToken {
        /// Login URL.
        url: String,
    },

    /// `import` was called before a successful login.
    #[error("import attempted without a session token")]
    NotLoggedIn,

    /// The import request was rejected.
    #[error("import to {url} failed with HTTP {status}: {body}")]
    Import {
        /// Import URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// A request could not be sent.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Request URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The settings are unusable.
    #[error("upload configuration: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },

    /// The artifact could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_display() {
        let err = UploadError::Login {
            url: "https://li/api/1/accounts/actions/login/".to_string(),
            status: 403,
        };
        assert_eq!(
            err.to_string(),
            "login to https://li/api/1/accounts/actions/login/ failed with HTTP 403"
        );
    }

    #[test]
    fn import_display() {
        let err = UploadError::Import {
            url: "u".to_string(),
            status: 400,
            body: "bad xml".to_string(),
        };
        assert_eq!(err.to_string(), "import to u failed with HTTP 400: bad xml");
    }

    #[test]
    fn not_logged_in_display() {
        assert_eq!(
            UploadError::NotLoggedIn.to_string(),
            "import attempted without a session token"
        );
    }
}
