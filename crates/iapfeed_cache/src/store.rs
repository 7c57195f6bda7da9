//! The file-backed TTL cache store.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entry::{decode_entry, encode_entry, EntryHeader};
use crate::error::CacheError;
use crate::key::CacheKey;

/// Subdirectory holding entry files.
const ENTRIES_DIR: &str = "entries";

/// Extension of entry files.
const ENTRY_EXT: &str = "entry";

/// Counts reported by [`CacheStore::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries that would be served.
    pub live: usize,
    /// Entries past their TTL.
    pub expired: usize,
    /// Entries that fail header or checksum validation.
    pub corrupt: usize,
    /// Total size of all entry files in bytes.
    pub bytes: u64,
}

/// Keyed TTL storage for upstream responses that survives process restarts.
///
/// Each write goes to a temporary file that is then renamed over the entry,
/// so payload, timestamp and TTL are replaced together and concurrent readers
/// never see a partial entry. The last writer wins.
pub struct CacheStore {
    cache_dir: PathBuf,
    default_ttl: Duration,
    write_seq: AtomicU64,
}

impl CacheStore {
    /// Opens a store rooted at `cache_dir`. The directory is created on first write.
    pub fn open(cache_dir: &Path, default_ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            default_ttl,
            write_seq: AtomicU64::new(0),
        }
    }

    /// Returns the cache root directory.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the TTL used when callers do not pick one.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the file path of the entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.entries_dir()
            .join(format!("{}.{ENTRY_EXT}", key.file_stem()))
    }

    /// Looks up a fresh entry. Missing, stale and corrupt entries are all misses.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.get_at(key, SystemTime::now())
    }

    /// Looks up an entry as of the instant `now`.
    pub fn get_at(&self, key: &CacheKey, now: SystemTime) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        let raw = std::fs::read(&path).ok()?;
        match decode_entry(&path, &raw) {
            Ok((header, payload)) => {
                if header.is_expired_at(unix_ms(now)) {
                    tracing::debug!(key = %key, "cache entry expired");
                    None
                } else {
                    Some(payload.to_vec())
                }
            }
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Writes `value` under `key` with the given TTL, replacing any previous entry.
    pub fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.set_at(key, value, ttl, SystemTime::now())
    }

    /// Writes an entry stamped with the instant `now`.
    pub fn set_at(
        &self,
        key: &CacheKey,
        value: &[u8],
        ttl: Duration,
        now: SystemTime,
    ) -> Result<(), CacheError> {
        let dir = self.entries_dir();
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let header = EntryHeader::new(key.operation(), unix_ms(now), ttl_ms, value);
        let bytes = encode_entry(&header, value)?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = dir.join(format!(
            "{}.tmp.{}.{seq}",
            key.file_stem(),
            std::process::id()
        ));
        std::fs::write(&tmp, &bytes).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;

        let path = self.entry_path(key);
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(CacheError::Io { path, source: e });
        }
        Ok(())
    }

    /// Reads and deserializes a JSON entry. Undecodable payloads are misses.
    pub fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = self.get(key)?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Serializes `value` as JSON and stores it.
    pub fn set_json<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Encode {
            reason: e.to_string(),
        })?;
        self.set(key, &bytes, ttl)
    }

    /// Removes the entry for `key`. Returns `true` if an entry existed.
    pub fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    /// Deletes expired and corrupt entries. Returns the number removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = unix_ms(SystemTime::now());
        self.remove_where(|header| match header {
            Some(h) => h.is_expired_at(now),
            None => true,
        })
    }

    /// Deletes every entry. Returns the number removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        self.remove_where(|_| true)
    }

    /// Deletes the entries written for one operation. Returns the number removed.
    pub fn clear_operation(&self, operation: &str) -> Result<usize, CacheError> {
        self.remove_where(|header| header.is_some_and(|h| h.operation == operation))
    }

    /// Counts live, expired and corrupt entries.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let now = unix_ms(SystemTime::now());
        let mut stats = CacheStats::default();
        for path in self.entry_files()? {
            let Ok(raw) = std::fs::read(&path) else {
                continue;
            };
            stats.bytes += raw.len() as u64;
            match decode_entry(&path, &raw) {
                Ok((header, _)) if header.is_expired_at(now) => stats.expired += 1,
                Ok(_) => stats.live += 1,
                Err(_) => stats.corrupt += 1,
            }
        }
        Ok(stats)
    }

    fn entries_dir(&self) -> PathBuf {
        self.cache_dir.join(ENTRIES_DIR)
    }

    /// Lists entry files. A missing directory is an empty cache.
    fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let dir = self.entries_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXT) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Removes entries for which `predicate` holds. The predicate receives
    /// `None` for entries that cannot be decoded.
    fn remove_where<F>(&self, predicate: F) -> Result<usize, CacheError>
    where
        F: Fn(Option<&EntryHeader>) -> bool,
    {
        let mut removed = 0;
        for path in self.entry_files()? {
            let header = std::fs::read(&path)
                .ok()
                .and_then(|raw| decode_entry(&path, &raw).ok().map(|(h, _)| h));
            if !predicate(header.as_ref()) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::Io { path, source: e }),
            }
        }
        Ok(removed)
    }
}

/// Milliseconds since the Unix epoch; instants before the epoch clamp to 0.
fn unix_ms(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
