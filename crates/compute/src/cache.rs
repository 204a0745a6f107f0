//! Result cache with batched least-recently-used eviction.
//!
//! Recency is tracked by an unbounded [`LruCache`]: every insert and hit
//! moves the entry to the most recently used end. Eviction is batched:
//! nothing is dropped until the cache holds more than three times the size
//! hint, and then it is cut back to the `2 * hint` most recently used
//! entries in one pass.

use std::hash::Hash;

use lru::LruCache;
use tracing::debug;

pub struct ResultCache<K: Hash + Eq, V> {
    cache: LruCache<K, V>,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V> Default for ResultCache<K, V> {
    fn default() -> Self {
        Self {
            cache: LruCache::unbounded(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K: Hash + Eq, V: Clone> ResultCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached value, marking it most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<V> {
        if let Some(value) = self.cache.get(key) {
            self.hits += 1;
            Some(value.clone())
        } else {
            self.misses += 1;
            None
        }
    }

    /// Insert or overwrite a value, marking it most recently used.
    pub fn put(&mut self, key: K, value: V) {
        self.cache.put(key, value);
    }

    /// Membership check that leaves recency untouched.
    pub fn contains(&self, key: &K) -> bool {
        self.cache.contains(key)
    }

    /// Trim the cache if it has grown past `3 * size_hint` entries.
    ///
    /// Keeps the `2 * size_hint` most recently used entries and returns how
    /// many were dropped.
    pub fn evict(&mut self, size_hint: usize) -> usize {
        let len = self.cache.len();
        if len <= size_hint.saturating_mul(3) {
            return 0;
        }

        let keep = size_hint.saturating_mul(2);
        while self.cache.len() > keep {
            if self.cache.pop_lru().is_none() {
                break;
            }
        }

        let evicted = len - self.cache.len();
        debug!(evicted, remaining = self.cache.len(), size_hint, "Evicted cached results");
        evicted
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> ResultCache<usize, String> {
        let mut cache = ResultCache::new();
        for i in 0..n {
            cache.put(i, format!("v{i}"));
        }
        cache
    }

    #[test]
    fn get_returns_stored_value() {
        let mut cache = filled(2);
        assert_eq!(cache.get(&1).as_deref(), Some("v1"));
        assert_eq!(cache.get(&7), None);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn put_overwrites_single_entry() {
        let mut cache = filled(1);
        cache.put(0, "new".to_string());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&0).as_deref(), Some("new"));
    }

    #[test]
    fn evict_is_noop_up_to_three_times_hint() {
        let mut cache = filled(9);
        assert_eq!(cache.evict(3), 0);
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn evict_cuts_to_twice_hint() {
        let mut cache = filled(10);
        assert_eq!(cache.evict(3), 4);
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn evict_keeps_most_recently_used() {
        let mut cache = filled(10);
        // Touch the two oldest so they survive.
        cache.get(&0);
        cache.get(&1);
        cache.evict(2);
        assert_eq!(cache.len(), 4);
        assert!(cache.contains(&0));
        assert!(cache.contains(&1));
        assert!(cache.contains(&9));
        assert!(cache.contains(&8));
        assert!(!cache.contains(&2));
    }

    #[test]
    fn overwrite_and_contains_affect_recency_as_expected() {
        let mut cache = filled(4);
        // Overwriting refreshes; `contains` and misses do not.
        cache.put(0, "again".to_string());
        assert!(cache.contains(&1));
        assert_eq!(cache.get(&42), None);
        assert_eq!(cache.evict(1), 2);
        assert!(cache.contains(&0));
        assert!(cache.contains(&3));
        assert!(!cache.contains(&1));
    }

    #[test]
    fn evict_with_zero_hint_empties_nonempty_cache() {
        let mut cache = filled(3);
        assert_eq!(cache.evict(0), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn bound_holds_across_sizes() {
        for n in 0..40 {
            for hint in 0..8 {
                let mut cache = filled(n);
                cache.evict(hint);
                if n > hint * 3 {
                    assert!(cache.len() <= hint * 2, "n={n} hint={hint}");
                } else {
                    assert_eq!(cache.len(), n);
                }
            }
        }
    }

    #[test]
    fn clear_resets_counters() {
        let mut cache = filled(3);
        cache.get(&0);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 0);
    }
}
