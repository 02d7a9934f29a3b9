//! Decode caches
//!
//! Two memoization layers sit in front of the field decoder:
//!
//! - **strings**: file offset → decoded string. Offsets are stable keys: the
//!   same offset always decodes to the same bytes, and the string pool is
//!   highly repetitive (country and ISP names recur across countless ranges).
//! - **entries**: (IP version, row index) → fully decoded [`Entry`]. A hit
//!   skips field decoding altogether. Off by default.
//!
//! Both follow the same contract: look up under a shared lock; on a miss,
//! decode with no lock held, then insert under an exclusive lock. Two threads
//! that miss on the same key both decode it and the second insert overwrites
//! the first with an identical value.
//!
//! The backing store is pluggable through [`CacheStore`] and selected with a
//! [`CachePolicy`]: an unbounded hash map, a size-bounded LRU, or nothing.
//! A cache lives exactly as long as the database state it belongs to and is
//! dropped wholesale on reset.

use crate::entry::Entry;
use crate::error::Result;
use crate::header::IpVersion;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::Serialize;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Concurrent key/value store backing a cache layer
pub trait CacheStore<K, V>: Send + Sync {
    /// Cached value for `key`, cloned out of the store
    fn get(&self, key: &K) -> Option<V>;

    /// Insert or overwrite `key`
    fn insert(&self, key: K, value: V);

    /// Number of cached values
    fn len(&self) -> usize;

    /// True if nothing is cached
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Grow-only hash map behind a read/write lock
pub struct UnboundedStore<K, V> {
    map: RwLock<FxHashMap<K, V>>,
}

impl<K, V> Default for UnboundedStore<K, V> {
    fn default() -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
        }
    }
}

impl<K, V> CacheStore<K, V> for UnboundedStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.map.read().get(key).cloned()
    }

    fn insert(&self, key: K, value: V) {
        self.map.write().insert(key, value);
    }

    fn len(&self) -> usize {
        self.map.read().len()
    }
}

/// Size-bounded least-recently-used store
///
/// An LRU hit reorders the recency list, so reads need exclusive access too.
pub struct LruStore<K: Hash + Eq, V> {
    lru: Mutex<LruCache<K, V, FxBuildHasher>>,
}

impl<K: Hash + Eq, V> LruStore<K, V> {
    /// Store holding at most `capacity` values
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            lru: Mutex::new(LruCache::with_hasher(capacity, FxBuildHasher)),
        }
    }
}

impl<K, V> CacheStore<K, V> for LruStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.lru.lock().get(key).cloned()
    }

    fn insert(&self, key: K, value: V) {
        self.lru.lock().put(key, value);
    }

    fn len(&self) -> usize {
        self.lru.lock().len()
    }
}

/// Store that never holds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

impl<K, V> CacheStore<K, V> for NoStore {
    fn get(&self, _key: &K) -> Option<V> {
        None
    }

    fn insert(&self, _key: K, _value: V) {}

    fn len(&self) -> usize {
        0
    }
}

/// How a cache layer is backed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// No caching; every lookup decodes
    Disabled,
    /// Keep everything for the life of the database state
    #[default]
    Unbounded,
    /// Keep at most this many values, evicting the least recently used
    Lru(NonZeroUsize),
}

impl CachePolicy {
    /// Policy from a capacity: 0 disables, anything else bounds an LRU
    pub fn with_capacity(capacity: usize) -> Self {
        NonZeroUsize::new(capacity).map_or(CachePolicy::Disabled, CachePolicy::Lru)
    }

    /// Instantiate a store for this policy
    pub fn build<K, V>(self) -> Box<dyn CacheStore<K, V>>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self {
            CachePolicy::Disabled => Box::new(NoStore),
            CachePolicy::Unbounded => Box::<UnboundedStore<K, V>>::default(),
            CachePolicy::Lru(cap) => Box::new(LruStore::new(cap)),
        }
    }
}

/// Row identity used as the entry cache key
pub type RowKey = (IpVersion, usize);

#[derive(Debug, Default)]
struct Counters {
    string_hits: AtomicU64,
    string_misses: AtomicU64,
    entry_hits: AtomicU64,
    entry_misses: AtomicU64,
}

/// Snapshot of cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// String lookups served from the cache
    pub string_hits: u64,
    /// String lookups that read the source
    pub string_misses: u64,
    /// Entry lookups served from the cache
    pub entry_hits: u64,
    /// Entry lookups that ran the decoder
    pub entry_misses: u64,
    /// Strings currently cached
    pub strings_cached: usize,
    /// Entries currently cached
    pub entries_cached: usize,
}

impl CacheStats {
    /// Fraction of string lookups served from the cache (0.0 to 1.0)
    pub fn string_hit_rate(&self) -> f64 {
        ratio(self.string_hits, self.string_misses)
    }

    /// Fraction of entry lookups served from the cache (0.0 to 1.0)
    pub fn entry_hit_rate(&self) -> f64 {
        ratio(self.entry_hits, self.entry_misses)
    }
}

fn ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// String and entry caches for one database state
pub struct DecodeCache {
    strings: Box<dyn CacheStore<u32, Arc<str>>>,
    entries: Box<dyn CacheStore<RowKey, Arc<Entry>>>,
    entries_enabled: bool,
    counters: Counters,
}

impl DecodeCache {
    /// Build caches for the given policies
    pub fn new(strings: CachePolicy, entries: CachePolicy) -> Self {
        Self {
            strings: strings.build(),
            entries: entries.build(),
            entries_enabled: entries != CachePolicy::Disabled,
            counters: Counters::default(),
        }
    }

    /// Cached string at `offset`, decoding it with `load` on a miss
    pub fn string<F>(&self, offset: u32, load: F) -> Result<Arc<str>>
    where
        F: FnOnce() -> Result<Arc<str>>,
    {
        if let Some(s) = self.strings.get(&offset) {
            self.counters.string_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(s);
        }
        self.counters.string_misses.fetch_add(1, Ordering::Relaxed);
        trace!(offset, "string cache miss");
        let s = load()?;
        self.strings.insert(offset, Arc::clone(&s));
        Ok(s)
    }

    /// Cached entry for `row`, decoding it with `load` on a miss
    pub fn entry<F>(&self, row: RowKey, load: F) -> Result<Arc<Entry>>
    where
        F: FnOnce() -> Result<Entry>,
    {
        if !self.entries_enabled {
            return load().map(Arc::new);
        }
        if let Some(e) = self.entries.get(&row) {
            self.counters.entry_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(e);
        }
        self.counters.entry_misses.fetch_add(1, Ordering::Relaxed);
        trace!(version = %row.0, row = row.1, "entry cache miss");
        let e = Arc::new(load()?);
        self.entries.insert(row, Arc::clone(&e));
        Ok(e)
    }

    /// True when whole-row caching is on
    pub fn caches_entries(&self) -> bool {
        self.entries_enabled
    }

    /// Current counters and sizes
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            string_hits: self.counters.string_hits.load(Ordering::Relaxed),
            string_misses: self.counters.string_misses.load(Ordering::Relaxed),
            entry_hits: self.counters.entry_hits.load(Ordering::Relaxed),
            entry_misses: self.counters.entry_misses.load(Ordering::Relaxed),
            strings_cached: self.strings.len(),
            entries_cached: self.entries.len(),
        }
    }
}

impl Default for DecodeCache {
    fn default() -> Self {
        Self::new(CachePolicy::Unbounded, CachePolicy::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeoError;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_string_cache_populates_once() {
        let cache = DecodeCache::default();
        let calls = AtomicUsize::new(0);
        let load = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::<str>::from("US"))
        };
        assert_eq!(&*cache.string(10, load).unwrap(), "US");
        assert_eq!(&*cache.string(10, load).unwrap(), "US");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.string_hits, 1);
        assert_eq!(stats.string_misses, 1);
        assert_eq!(stats.strings_cached, 1);
        assert_eq!(stats.string_hit_rate(), 0.5);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = DecodeCache::default();
        let err = cache.string(7, || Err(GeoError::ShortBuffer {
            needed: 3,
            available: 1,
        }));
        assert!(err.is_err());
        assert_eq!(cache.stats().strings_cached, 0);
        assert_eq!(&*cache.string(7, || Ok(Arc::from("ok"))).unwrap(), "ok");
    }

    #[test]
    fn test_disabled_entry_cache_always_decodes() {
        let cache = DecodeCache::new(CachePolicy::Disabled, CachePolicy::Disabled);
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            cache
                .entry((IpVersion::V4, 0), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Entry::default())
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!cache.caches_entries());
        assert_eq!(cache.stats().entry_misses, 0);
    }

    #[test]
    fn test_entry_cache_keys_by_version_and_row() {
        let cache = DecodeCache::new(CachePolicy::Unbounded, CachePolicy::Unbounded);
        let mut v4 = Entry::default();
        v4.country = "US".into();
        let mut v6 = Entry::default();
        v6.country = "DE".into();

        cache.entry((IpVersion::V4, 3), || Ok(v4.clone())).unwrap();
        cache.entry((IpVersion::V6, 3), || Ok(v6.clone())).unwrap();

        let hit = cache
            .entry((IpVersion::V4, 3), || panic!("should be cached"))
            .unwrap();
        assert_eq!(hit.country, "US");
        let hit = cache
            .entry((IpVersion::V6, 3), || panic!("should be cached"))
            .unwrap();
        assert_eq!(hit.country, "DE");
        assert_eq!(cache.stats().entries_cached, 2);
    }

    #[test]
    fn test_lru_store_evicts() {
        let store: LruStore<u32, u32> = LruStore::new(NonZeroUsize::new(2).unwrap());
        store.insert(1, 10);
        store.insert(2, 20);
        assert_eq!(store.get(&1), Some(10)); // 1 becomes most recent
        store.insert(3, 30);
        assert_eq!(store.get(&2), None);
        assert_eq!(store.get(&1), Some(10));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_policy_with_capacity() {
        assert_eq!(CachePolicy::with_capacity(0), CachePolicy::Disabled);
        assert_eq!(
            CachePolicy::with_capacity(5),
            CachePolicy::Lru(NonZeroUsize::new(5).unwrap())
        );
    }

    #[test]
    fn test_concurrent_decodes_agree() {
        let cache = Arc::new(DecodeCache::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    (0..100u32)
                        .map(|off| {
                            cache
                                .string(off, || Ok(Arc::from(format!("s{}", off))))
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
        assert_eq!(cache.stats().strings_cached, 100);
    }
}
