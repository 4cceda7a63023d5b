//! Concurrent write-once cache.
//!
//! Each key is filled at most once and the stored value is never replaced.
//! Concurrent first requests for the same key serialize on the map shard
//! lock so the constructor runs exactly once; later lookups only take the
//! shard read lock and clone an `Arc`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters describing cache activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: usize,
    /// Lookups served from the cache
    pub hits: usize,
    /// Values constructed
    pub fills: usize,
}

/// A concurrent map whose entries are created once and shared via `Arc`.
pub struct WriteOnceCache<K, V> {
    entries: DashMap<K, Arc<V>>,
    hits: AtomicUsize,
    fills: AtomicUsize,
}

impl<K: Hash + Eq + Clone, V> WriteOnceCache<K, V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
            fills: AtomicUsize::new(0),
        }
    }

    /// Look up an existing entry.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let value = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Return the entry for `key`, constructing it with `init` if absent.
    ///
    /// `init` runs while the shard lock is held, so two threads asking for
    /// the same missing key never both construct it. A failing `init` leaves
    /// the key empty.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, init: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                let value = Arc::new(init(entry.key())?);
                self.fills.fetch_add(1, Ordering::Relaxed);
                entry.insert(Arc::clone(&value));
                Ok(value)
            }
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys currently cached.
    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Activity counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            fills: self.fills.load(Ordering::Relaxed),
        }
    }
}

impl<K: Hash + Eq + Clone, V> Default for WriteOnceCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::thread;

    #[test]
    fn test_fill_once() {
        let cache: WriteOnceCache<u32, String> = WriteOnceCache::new();
        let a = cache
            .get_or_try_insert_with(1, |k| Ok::<_, Infallible>(format!("v{}", k)))
            .unwrap();
        let b = cache
            .get_or_try_insert_with(1, |_| Ok::<_, Infallible>("other".to_string()))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*b, "v1");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.fills, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_failed_init_leaves_key_empty() {
        let cache: WriteOnceCache<u32, u32> = WriteOnceCache::new();
        let err = cache.get_or_try_insert_with(7, |_| Err("nope"));
        assert_eq!(err.unwrap_err(), "nope");
        assert!(cache.get(&7).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_first_requests() {
        let cache: Arc<WriteOnceCache<u8, usize>> = Arc::new(WriteOnceCache::new());
        let constructed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let constructed = Arc::clone(&constructed);
                thread::spawn(move || {
                    cache
                        .get_or_try_insert_with(3, |_| {
                            constructed.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, Infallible>(42)
                        })
                        .unwrap()
                })
            })
            .collect();

        let values: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }
}
