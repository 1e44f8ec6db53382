//! Durable entry store
//!
//! One JSON file per cache key under the cache directory. Writes go through
//! a temp file that is renamed into place, so a reader never sees a partial
//! entry. Concurrent writers of the same key race; the last rename wins.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::CacheError;

/// Extension of entry files
const ENTRY_EXT: &str = "json";

/// A memoized remote result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hash of operation id and arguments
    pub key: String,
    /// Operation id, kept for diagnostics
    pub operation: String,
    /// Insertion time in milliseconds since the Unix epoch
    pub stored_at_ms: u64,
    /// Freshness window in milliseconds
    pub ttl_ms: u64,
    pub value: serde_json::Value,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        operation: impl Into<String>,
        ttl: Duration,
        value: serde_json::Value,
    ) -> Self {
        Self {
            key: key.into(),
            operation: operation.into(),
            stored_at_ms: now_ms(),
            ttl_ms: ttl.as_millis() as u64,
            value,
        }
    }

    /// Fresh iff `now - stored_at < ttl`
    pub fn is_fresh_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) < self.ttl_ms
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(now_ms())
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Directory of cache entry files
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Open (creating if needed) the store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        let store = Self { dir };
        store.cleanup();

        info!(cache_dir = %store.dir.display(), "Cache store opened");
        Ok(store)
    }

    /// Read the entry for `key`, fresh or not
    pub fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        let entry: CacheEntry = serde_json::from_str(&json)?;
        Ok(Some(entry))
    }

    /// Write an entry, replacing any previous one for the same key
    pub fn store(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.entry_path(&entry.key);
        let json = serde_json::to_vec(entry)?;

        let mut tmp = tempfile::Builder::new()
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| CacheError::io(&self.dir, e))?;
        tmp.write_all(&json).map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.persist(&path)?;

        debug!(
            key = %entry.key,
            operation = %entry.operation,
            size = json.len(),
            "Stored cache entry"
        );
        Ok(())
    }

    /// Delete entries whose TTL has elapsed, and entries that no longer
    /// parse. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        let now = now_ms();
        let mut removed = 0;

        for dir_entry in read_dir.flatten() {
            let path = dir_entry.path();
            if path.extension().map_or(true, |ext| ext != ENTRY_EXT) {
                continue;
            }

            let json = match fs::read_to_string(&path) {
                Ok(json) => json,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable cache entry, skipping");
                    continue;
                }
            };

            let expired = match serde_json::from_str::<CacheEntry>(&json) {
                Ok(entry) => !entry.is_fresh_at(now),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt cache entry, removing");
                    true
                }
            };

            if expired {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(CacheError::io(path, e)),
                }
            }
        }

        if removed > 0 {
            debug!(removed = removed, "Purged expired cache entries");
        }
        Ok(removed)
    }

    /// Remove temp files left by interrupted writes
    fn cleanup(&self) {
        if let Ok(read_dir) = fs::read_dir(&self.dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "tmp") {
                    debug!(path = %path.display(), "Removing stale temp file");
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXT))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
