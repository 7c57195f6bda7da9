use std::path::PathBuf;

/// Errors raised by the response cache.
///
/// `get` never returns these: a damaged entry reads as a miss. Writes and
/// maintenance commands report them.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache file or directory could not be accessed.
    #[error("cannot access {}: {source}", path.display())]
    Io {
        /// File or directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The entry header is truncated, undecodable or has the wrong magic.
    #[error("corrupt cache entry {}: {reason}", path.display())]
    Corrupt {
        /// Entry file.
        path: PathBuf,
        /// What is wrong.
        reason: String,
    },

    /// The payload does not hash to the checksum stored in the header.
    #[error("cache entry {} fails its checksum (stored {stored}, computed {computed})", path.display())]
    PayloadChecksum {
        /// Entry file.
        path: PathBuf,
        /// Checksum in the header.
        stored: String,
        /// Checksum of the payload on disk.
        computed: String,
    },

    /// The entry was written by another format version.
    #[error("cache entry {} has unsupported format version {found}", path.display())]
    UnsupportedVersion {
        /// Entry file.
        path: PathBuf,
        /// Version in the header.
        found: u32,
    },

    /// A header or JSON value could not be encoded.
    #[error("cannot encode cache entry: {reason}")]
    Encode {
        /// Encoder message.
        reason: String,
    },
}
