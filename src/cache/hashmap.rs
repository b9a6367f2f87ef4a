//! HashMap-based cache using the standard library.
//!
//! Highest hit rate (no collisions) at the cost of allocation overhead.

use std::collections::HashMap;
use std::hash::Hash;

/// A cache backed by [HashMap].
pub struct HashMapCache<K, V> {
    map: HashMap<K, V>,
    hits: usize,
    misses: usize,
}

impl<K, V> Default for HashMapCache<K, V> {
    fn default() -> Self {
        Self::new(14)
    }
}

impl<K, V> HashMapCache<K, V> {
    /// Creates a new HashMap-based cache with room for `2^bits` entries.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Cache bits must be in range 0..=31, got {}", bits);
        Self {
            map: HashMap::with_capacity(1 << bits),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the number of cache hits.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Returns the number of cache misses.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Clears all entries from the cache.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> usize {
        let before = self.map.len();
        self.map.retain(|k, v| keep(k, v));
        before - self.map.len()
    }
}

impl<K, V> HashMapCache<K, V>
where
    K: Hash + Eq,
    V: Copy,
{
    /// Looks up a key in the cache.
    #[inline]
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.map.get(key) {
            Some(&v) => {
                self.hits += 1;
                Some(v)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Inserts a key-value pair into the cache.
    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_cache_basic() {
        let mut cache = HashMapCache::<(u64, u64), i32>::new(4);

        cache.insert((1, 2), 42);
        cache.insert((3, 4), 99);

        assert_eq!(cache.get(&(1, 2)), Some(42));
        assert_eq!(cache.get(&(3, 4)), Some(99));
        assert_eq!(cache.get(&(5, 6)), None);

        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_hashmap_cache_clear() {
        let mut cache = HashMapCache::<(u64, u64), i32>::new(4);

        cache.insert((1, 2), 42);
        assert_eq!(cache.get(&(1, 2)), Some(42));

        cache.clear();
        assert_eq!(cache.get(&(1, 2)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hashmap_cache_retain() {
        let mut cache = HashMapCache::<(u64, u64), u64>::new(4);
        for i in 0..10 {
            cache.insert((i, i + 1), i * 2);
        }

        let removed = cache.retain(|&(a, _), _| a % 2 == 0);
        assert_eq!(removed, 5);
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.get(&(4, 5)), Some(8));
        assert_eq!(cache.get(&(3, 4)), None);
    }
}
