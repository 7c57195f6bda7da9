//! Stable cache keys.

use std::fmt;

use iapfeed_common::ContentHash;

/// Key of a cached response: the operation name plus a hash of the
/// operation name and its arguments.
///
/// The operation name is kept in clear so entries can be cleared per
/// operation; the hash names the entry file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: String,
    hash: ContentHash,
}

impl CacheKey {
    /// Builds the key for `operation(args...)`.
    pub fn new(operation: &str, args: &[&str]) -> Self {
        let mut parts = Vec::with_capacity(args.len() + 1);
        parts.push(operation);
        parts.extend_from_slice(args);
        Self {
            operation: operation.to_string(),
            hash: ContentHash::from_parts(&parts),
        }
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the file stem the entry is stored under.
    pub fn file_stem(&self) -> String {
        self.hash.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation, self.hash)
    }
}
