use thiserror::Error;

/// Errors raised during reconciliation and scope loading.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A netmask could not be converted to a prefix length.
    #[error("invalid netmask '{netmask}': {reason}")]
    InvalidNetmask {
        /// The netmask as stored.
        netmask: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A network column did not hold an address.
    #[error("invalid network '{network}'")]
    InvalidNetwork {
        /// The network as stored.
        network: String,
    },

    /// The scope database could not be queried.
    #[error("scope database query failed: {source}")]
    Database {
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The scope source is misconfigured.
    #[error("scope source configuration: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netmask_display() {
        let err = ReconcileError::InvalidNetmask {
            netmask: "255.255.255.255.0".to_string(),
            reason: "not a dotted-decimal mask".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid netmask '255.255.255.255.0': not a dotted-decimal mask"
        );
    }

    #[test]
    fn network_display() {
        let err = ReconcileError::InvalidNetwork {
            network: "cmts".to_string(),
        };
        assert_eq!(err.to_string(), "invalid network 'cmts'");
    }
}
