//! XXH3 digests naming cache entries and guarding their payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// XXH3-128 digest of a cache key or a cached payload.
///
/// The lowercase hex form is the entry file stem.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(u128);

impl ContentHash {
    /// Digests a cached payload.
    pub fn digest(payload: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(payload))
    }

    /// Digests an operation name and its arguments, NUL-separated so that
    /// `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn from_parts(parts: &[&str]) -> Self {
        let joined = parts.join("\0");
        Self::digest(joined.as_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{:08x}", self.0 >> 96)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_request_same_key() {
        let a = ContentHash::digest(b"devices?group=207");
        let b = ContentHash::digest(b"devices?group=207");
        assert_eq!(a, b);
    }

    #[test]
    fn parts_are_separated() {
        let a = ContentHash::from_parts(&["ab", "c"]);
        let b = ContentHash::from_parts(&["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn single_part_matches_digest() {
        assert_eq!(
            ContentHash::from_parts(&["interfaces"]),
            ContentHash::digest(b"interfaces")
        );
    }

    #[test]
    fn file_stem_form_is_zero_padded_hex() {
        let stem = ContentHash(0xab).to_string();
        assert_eq!(stem.len(), 32);
        assert!(stem.starts_with("0000"));
        assert!(stem.ends_with("ab"));
    }

    #[test]
    fn debug_shows_leading_bits() {
        let hash = ContentHash(0x1234_5678 << 96);
        assert_eq!(format!("{hash:?}"), "key:12345678");
    }
}
