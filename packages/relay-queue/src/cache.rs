//! Concurrent memoizing cache.

use dashmap::DashMap;
use std::hash::Hash;


/// Concurrent map that computes each value at most once
///
/// Meant to be constructed by whoever needs the cache and passed to its users, rather than living
/// in a global.
pub struct MemoCache<K, V> {
    entries: DashMap<K, V>,
}

impl<K: Eq + Hash, V: Clone> MemoCache<K, V> {
    /// Construct empty
    pub fn new() -> Self {
        MemoCache { entries: DashMap::new() }
    }

    /// Get the cached value for `key`, or compute it with `f` and cache it
    ///
    /// Concurrent callers for the same key wait on each other, so `f` runs at most once per key.
    /// `f` must not access this cache.
    pub fn get_or_insert_with<F>(&self, key: K, f: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(entry) = self.entries.get(&key) {
            return entry.value().clone();
        }
        self.entries.entry(key).or_insert_with(f).value().clone()
    }

    /// Get the cached value for `key`, if any
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all cached entries
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<K: Eq + Hash, V: Clone> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
