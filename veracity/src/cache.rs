//! Bounded, thread safe least recently used cache.
//!
//! The cache is a plain value: whoever needs memoization creates one and
//! passes it by reference, there is no process wide instance.

use crate::constants::DEFAULT_CACHE_CAPACITY;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;

pub struct LruCache<K: Hash + Eq, V> {
    inner: Mutex<lru::LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> LruCache<K, V> {
    /// A capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        LruCache {
            inner: Mutex::new(lru::LruCache::new(capacity)),
        }
    }

    /// Returns a clone of the cached value and marks it as most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    /// Inserts a value, evicting the least recently used entry when full
    pub fn insert(&self, key: K, value: V) {
        let mut cache = self.inner.lock();
        let replaces = cache.contains(&key);
        if cache.push(key, value).is_some() && !replaces {
            trace!("Cache at capacity {}, evicted one entry", cache.cap());
        }
    }

    /// Looks up `key`, computing and storing the value on a miss. The lock is
    /// not held while `f` runs, so two racing callers may both compute.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&self, key: K, f: F) -> V {
        if let Some(v) = self.get(&key) {
            return v;
        }
        let value = f();
        self.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    pub fn clear(&self) {
        self.inner.lock().clear()
    }
}

impl<K: Hash + Eq, V: Clone> Default for LruCache<K, V> {
    fn default() -> Self {
        LruCache::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn evicts_least_recently_used() {
        let cache: LruCache<u32, &str> = LruCache::new(2);
        cache.insert(1, "one");
        cache.insert(2, "two");
        // touch 1 so 2 becomes the eviction candidate
        assert_eq!(cache.get(&1), Some("one"));
        cache.insert(3, "three");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some("one"));
        assert_eq!(cache.get(&3), Some("three"));
    }

    #[test]
    fn capacity_is_bounded() {
        let cache: LruCache<usize, usize> = LruCache::new(16);
        for i in 0..1000 {
            cache.insert(i, i * 2);
        }
        assert_eq!(cache.len(), 16);
        assert_eq!(cache.capacity(), 16);
        assert_eq!(cache.get(&999), Some(1998));
        assert_eq!(cache.get(&0), None);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let cache: LruCache<u8, u8> = LruCache::new(0);
        cache.insert(1, 1);
        cache.insert(2, 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2), Some(2));
    }

    #[test]
    fn default_capacity() {
        let cache: LruCache<u8, u8> = LruCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CACHE_CAPACITY);
        assert!(cache.is_empty());
    }

    #[test]
    fn get_or_insert_computes_once() {
        let cache: LruCache<&str, usize> = LruCache::new(4);
        let mut calls = 0;
        let a = cache.get_or_insert_with("a", || {
            calls += 1;
            7
        });
        let b = cache.get_or_insert_with("a", || {
            calls += 1;
            8
        });
        assert_eq!((a, b, calls), (7, 7, 1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn shared_between_threads() {
        let cache: Arc<LruCache<u64, u64>> = Arc::new(LruCache::new(64));
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..500u64 {
                        cache.insert(t * 1000 + i, i);
                        cache.get(&(t * 1000 + i / 2));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 64);
    }
}
