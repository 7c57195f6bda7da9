//! On-disk format of a single cache entry.
//!
//! Layout: 4-byte little-endian header length, bincode-encoded
//! [`EntryHeader`], then the payload bytes. The header carries the write
//! timestamp and TTL, so freshness is decided from the file alone.

use std::path::Path;

use iapfeed_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Magic bytes identifying an iapfeed cache entry.
const ENTRY_MAGIC: [u8; 4] = *b"IAPC";

/// Current entry format version. Increment on breaking changes to the header.
pub const ENTRY_FORMAT_VERSION: u32 = 1;

/// Header prepended to every cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Magic bytes: must be `b"IAPC"`.
    pub magic: [u8; 4],
    /// Entry format version.
    pub format_version: u32,
    /// Operation name of the cache key.
    pub operation: String,
    /// Write time, milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// Time-to-live in milliseconds.
    pub ttl_ms: u64,
    /// Checksum of the payload.
    pub checksum: ContentHash,
}

impl EntryHeader {
    /// Creates a header for a payload written at `created_at_ms`.
    pub fn new(operation: &str, created_at_ms: u64, ttl_ms: u64, payload: &[u8]) -> Self {
        Self {
            magic: ENTRY_MAGIC,
            format_version: ENTRY_FORMAT_VERSION,
            operation: operation.to_string(),
            created_at_ms,
            ttl_ms,
            checksum: ContentHash::digest(payload),
        }
    }

    /// Returns the first instant (ms since epoch) at which the entry is stale.
    pub fn expires_at_ms(&self) -> u64 {
        self.created_at_ms.saturating_add(self.ttl_ms)
    }

    /// An entry read at or after its expiry is stale.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms()
    }
}

/// Encodes a header and payload into the on-disk byte layout.
pub fn encode_entry(header: &EntryHeader, payload: &[u8]) -> Result<Vec<u8>, CacheError> {
    let header_bytes = bincode::serde::encode_to_vec(header, bincode::config::standard())
        .map_err(|e| CacheError::Encode {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(payload);
    Ok(output)
}

/// Decodes and validates an entry read from `path`.
///
/// Returns the header and a slice of the payload. Magic, version and
/// checksum are all verified.
pub fn decode_entry<'a>(path: &Path, raw: &'a [u8]) -> Result<(EntryHeader, &'a [u8]), CacheError> {
    let invalid = |reason: &str| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let len_bytes: [u8; 4] = raw
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| invalid("file shorter than header length prefix"))?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_end = 4usize
        .checked_add(header_len)
        .filter(|end| *end <= raw.len())
        .ok_or_else(|| invalid("truncated header"))?;

    let (header, _): (EntryHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..header_end], bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?;

    if header.magic != ENTRY_MAGIC {
        return Err(invalid("bad magic bytes"));
    }
    if header.format_version != ENTRY_FORMAT_VERSION {
        return Err(CacheError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: header.format_version,
        });
    }

    let payload = &raw[header_end..];
    let actual = ContentHash::digest(payload);
    if actual != header.checksum {
        return Err(CacheError::PayloadChecksum {
            path: path.to_path_buf(),
            stored: header.checksum.to_string(),
            computed: actual.to_string(),
        });
    }

    Ok((header, payload))
}
