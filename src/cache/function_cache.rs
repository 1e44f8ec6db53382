//! Memoization of remote calls
//!
//! `call_cached` keys a result by operation id and the canonical JSON form
//! of its arguments. Fresh entries are served from the in-memory layer or
//! the disk store; anything else triggers the remote call and a write.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::{de::DeserializeOwned, Serialize};
use sha1::{Digest, Sha1};
use tracing::{debug, info, trace};

use super::store::{now_ms, CacheEntry, DiskStore};
use super::{ttl, CacheError};

/// Upper bound for the in-memory layer; entries carry their own TTL on top
const MEMORY_TTL: Duration = ttl::ONE_DAY;

/// Durable, TTL-based memoization of remote calls
pub struct FunctionCache {
    /// Durable entries, shared across process invocations
    store: DiskStore,
    /// Entries already read or written by this process
    memory: Cache<String, Arc<CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FunctionCache {
    /// Open the cache rooted at `dir`, dropping entries that already expired
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let store = DiskStore::open(dir.as_ref())?;
        store.purge_expired()?;

        let memory = Cache::builder()
            .time_to_live(MEMORY_TTL)
            .name("remote_call_cache")
            .build();

        Ok(Self {
            store,
            memory,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Return the memoized result of `remote_fn`, calling it only when no
    /// fresh entry exists for `operation` + `args`
    ///
    /// A failing `remote_fn` leaves the cache untouched and its error is
    /// returned as is.
    pub fn call_cached<A, T, E, F>(
        &self,
        operation: &str,
        args: &A,
        ttl: Duration,
        remote_fn: F,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Result<T, E>,
    {
        let key = cache_key(operation, args)?;

        if let Some(entry) = self.lookup(&key)? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(operation = operation, key = %key, "Cache HIT");
            let value = serde_json::from_value(entry.value.clone()).map_err(CacheError::from)?;
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(operation = operation, key = %key, "Cache MISS, calling remote");

        let result = remote_fn()?;
        let value = serde_json::to_value(&result).map_err(CacheError::from)?;
        let entry = CacheEntry::new(key.clone(), operation, ttl, value);
        self.store.store(&entry)?;
        self.memory.insert(key, Arc::new(entry));

        Ok(result)
    }

    /// A fresh entry for `key`, from memory first, then disk
    fn lookup(&self, key: &str) -> Result<Option<Arc<CacheEntry>>, CacheError> {
        let now = now_ms();

        if let Some(entry) = self.memory.get(key) {
            if entry.is_fresh_at(now) {
                return Ok(Some(entry));
            }
            trace!(key = key, "Memory entry stale");
            self.memory.invalidate(key);
        }

        match self.store.load(key)? {
            Some(entry) if entry.is_fresh_at(now) => {
                let entry = Arc::new(entry);
                self.memory.insert(key.to_string(), Arc::clone(&entry));
                Ok(Some(entry))
            }
            Some(_) => {
                trace!(key = key, "Disk entry stale");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Delete expired entries from disk
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        self.store.purge_expired()
    }

    /// Returns (hits, misses, hit_rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    /// Tear down: purge expired entries and log metrics
    ///
    /// Entries are written through on every miss, so there is nothing left
    /// to flush.
    pub fn close(self) -> Result<(), CacheError> {
        let removed = self.store.purge_expired()?;
        let (hits, misses, hit_rate) = self.stats();
        info!(
            hits = hits,
            misses = misses,
            hit_rate = format!("{:.1}%", hit_rate),
            purged = removed,
            cache_dir = %self.store.dir().display(),
            "Cache closed"
        );
        Ok(())
    }
}

/// Stable key for an operation and its arguments
///
/// The arguments are serialized to JSON, so both their order and their
/// types are part of the key.
pub fn cache_key<A: Serialize + ?Sized>(operation: &str, args: &A) -> Result<String, CacheError> {
    let args_json = serde_json::to_string(args)?;
    let mut hasher = Sha1::new();
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(args_json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::cell::Cell;

    fn counted(calls: &Cell<u32>, value: Value) -> impl FnOnce() -> Result<Value, CacheError> + '_ {
        move || {
            calls.set(calls.get() + 1);
            Ok(value)
        }
    }

    #[test]
    fn test_second_call_within_ttl_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FunctionCache::open(dir.path()).unwrap();
        let calls = Cell::new(0);

        let first: Value = cache
            .call_cached("get_trending", &("music", 1), ttl::ONE_HOUR, counted(&calls, json!({"n": 1})))
            .unwrap();
        let second: Value = cache
            .call_cached("get_trending", &("music", 1), ttl::ONE_HOUR, counted(&calls, json!({"n": 2})))
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, json!({"n": 1}));
        assert_eq!(second, json!({"n": 1}));
        assert_eq!(cache.stats().0, 1);
        assert_eq!(cache.stats().1, 1);
    }

    #[test]
    fn test_expired_entry_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FunctionCache::open(dir.path()).unwrap();
        let calls = Cell::new(0);
        let short = Duration::from_millis(200);

        let _: Value = cache
            .call_cached("search", &("house", 1), short, counted(&calls, json!(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(300));
        let again: Value = cache
            .call_cached("search", &("house", 1), short, counted(&calls, json!(2)))
            .unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(again, json!(2));
    }

    #[test]
    fn test_entry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Cell::new(0);

        {
            let cache = FunctionCache::open(dir.path()).unwrap();
            let _: Value = cache
                .call_cached("get_categories", &(), ttl::ONE_DAY, counted(&calls, json!({"music": []})))
                .unwrap();
            cache.close().unwrap();
        }

        let cache = FunctionCache::open(dir.path()).unwrap();
        let value: Value = cache
            .call_cached("get_categories", &(), ttl::ONE_DAY, counted(&calls, json!(null)))
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(value, json!({"music": []}));
    }

    #[test]
    fn test_key_is_order_and_type_sensitive() {
        let a = cache_key("op", &("house", 1)).unwrap();
        let b = cache_key("op", &(1, "house")).unwrap();
        let c = cache_key("op", &("house", "1")).unwrap();
        let d = cache_key("other", &("house", 1)).unwrap();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a, cache_key("op", &("house", 1)).unwrap());
    }

    #[test]
    fn test_remote_error_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FunctionCache::open(dir.path()).unwrap();
        let calls = Cell::new(0);

        let failed: Result<Value, CacheError> = cache.call_cached("op", &1, ttl::ONE_MINUTE, || {
            calls.set(calls.get() + 1);
            Err(CacheError::io("/remote", std::io::Error::other("boom")))
        });
        assert!(failed.is_err());

        let ok: Value = cache
            .call_cached("op", &1, ttl::ONE_MINUTE, counted(&calls, json!("ok")))
            .unwrap();
        assert_eq!(ok, json!("ok"));
        assert_eq!(calls.get(), 2);
    }
}
