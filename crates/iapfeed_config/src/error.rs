use std::path::PathBuf;

/// Errors raised while loading or resolving `iapfeed.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// Configuration file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema.
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// A required value is absent.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A value is present but unusable.
    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field() {
        let err = ConfigError::MissingField("groups.pe.inventory_group".to_string());
        assert_eq!(err.to_string(), "missing required field: groups.pe.inventory_group");
    }

    #[test]
    fn read_names_the_file() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/iapfeed/iapfeed.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "cannot read /etc/iapfeed/iapfeed.toml: not found");
    }

    #[test]
    fn validation() {
        let err = ConfigError::ValidationError("cache.ttl_secs must be greater than 0".to_string());
        assert_eq!(
            err.to_string(),
            "validation error: cache.ttl_secs must be greater than 0"
        );
    }
}
