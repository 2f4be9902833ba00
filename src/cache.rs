//! Time-bounded cache keyed by query scope.
//!
//! Entries are served while younger than the TTL and are cleared wholesale on
//! any mutation. Every `clear` bumps a generation counter so that a fetch which
//! started before the mutation cannot repopulate the cache after it.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::clock::Clock;

pub const CACHE_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    pub fetched_at: DateTime<Utc>,
}

pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    generation: u64,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(Duration::seconds(CACHE_TTL_SECS), clock)
    }

    pub fn with_ttl(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
            generation: 0,
        }
    }

    /// Cached data for `key` if it is still within the TTL.
    pub fn fresh(&self, key: &K) -> Option<&V> {
        let entry = self.entries.get(key)?;
        let age = self.clock.now().signed_duration_since(entry.fetched_at);
        // A negative age means the clock stepped backwards; treat as stale.
        (age >= Duration::zero() && age < self.ttl).then_some(&entry.data)
    }

    pub fn insert(&mut self, key: K, data: V) {
        let fetched_at = self.clock.now();
        self.entries.insert(key, CacheEntry { data, fetched_at });
    }

    /// Insert only if no `clear` happened since `generation` was observed.
    pub fn insert_if_current(&mut self, key: K, data: V, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.insert(key, data);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
