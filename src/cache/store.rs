use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Instant;

use super::policy::{build_policy, EvictionPolicy};
use super::types::{CacheEntry, TierConfig};

/// Lookup and eviction counters of one store, cumulative for its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounters {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room for a new key
    pub evictions: u64,
    /// Entries found older than the TTL on read
    pub expirations: u64,
}

impl StoreCounters {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Bounded key/value store with a pluggable eviction policy and optional TTL.
///
/// Not synchronized; the coordinator wraps each store in its own mutex.
pub struct TieredStore<K, V> {
    config: TierConfig,
    entries: HashMap<K, CacheEntry<K, V>>,
    policy: Box<dyn EvictionPolicy<K>>,
    total_bytes: usize,
    counters: StoreCounters,
}

impl<K, V> fmt::Debug for TieredStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredStore")
            .field("config", &self.config)
            .field("len", &self.entries.len())
            .field("total_bytes", &self.total_bytes)
            .field("counters", &self.counters)
            .finish()
    }
}

impl<K, V> TieredStore<K, V>
where
    K: Hash + Eq + Clone + Send + fmt::Debug + 'static,
    V: Clone,
{
    pub fn new(config: TierConfig) -> Self {
        let policy = build_policy(config.eviction_policy);
        Self::with_policy(config, policy)
    }

    /// Create a store with a caller-supplied eviction strategy
    pub fn with_policy(config: TierConfig, policy: Box<dyn EvictionPolicy<K>>) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            policy,
            total_bytes: 0,
            counters: StoreCounters::default(),
        }
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Look up `key`, refreshing its recency on a hit
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`. Entries older than the TTL are removed and reported absent.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let Some(entry) = self.entries.get_mut(key) else {
            self.counters.misses += 1;
            return None;
        };

        let expired = self
            .config
            .ttl
            .is_some_and(|ttl| now.saturating_duration_since(entry.created_at) > ttl);

        if !expired {
            entry.last_accessed_at = now;
            self.policy.on_access(key);
            self.counters.hits += 1;
            return Some(entry.value.clone());
        }

        self.remove_entry(key);
        self.counters.expirations += 1;
        self.counters.misses += 1;
        None
    }

    /// Presence check that leaves recency, TTL and counters alone
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite `key`. Returns the keys evicted to make room.
    pub fn put(&mut self, key: K, value: V, size_estimate: usize) -> Vec<K> {
        self.put_at(key, value, size_estimate, Instant::now())
    }

    pub fn put_at(&mut self, key: K, value: V, size_estimate: usize, now: Instant) -> Vec<K> {
        let mut evicted = Vec::new();

        if let Some(previous) = self.entries.remove(&key) {
            self.total_bytes = self.total_bytes.saturating_sub(previous.size_estimate);
        } else {
            while self.entries.len() >= self.config.max_entries {
                let Some(victim) = self.policy.next_victim() else {
                    break;
                };
                if let Some(entry) = self.entries.remove(&victim) {
                    self.total_bytes = self.total_bytes.saturating_sub(entry.size_estimate);
                    self.counters.evictions += 1;
                    evicted.push(victim);
                }
            }
        }

        self.policy.on_insert(&key);
        self.total_bytes = self.total_bytes.saturating_add(size_estimate);
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                created_at: now,
                last_accessed_at: now,
                size_estimate,
            },
        );

        evicted
    }

    /// Remove `key`. Returns whether it was present.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.remove_entry(key)
    }

    /// Remove every entry whose key fails `keep`. Returns the removed keys.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) -> Vec<K> {
        let doomed: Vec<K> = self
            .entries
            .keys()
            .filter(|key| !keep(*key))
            .cloned()
            .collect();
        for key in &doomed {
            self.remove_entry(key);
        }
        doomed
    }

    /// Remove all entries. Counters are kept.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.policy.clear();
        self.total_bytes = 0;
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn counters(&self) -> StoreCounters {
        self.counters
    }

    fn remove_entry(&mut self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.policy.on_remove(key);
                self.total_bytes = self.total_bytes.saturating_sub(entry.size_estimate);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::EvictionPolicyKind;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn store(max_entries: usize) -> TieredStore<String, u32> {
        TieredStore::new(TierConfig::lru(max_entries))
    }

    #[test]
    fn test_overflow_evicts_least_recently_used() {
        let mut store = store(3);
        store.put("a".into(), 1, 1);
        store.put("b".into(), 2, 1);
        store.put("c".into(), 3, 1);

        let evicted = store.put("d".into(), 4, 1);

        assert_eq!(evicted, vec!["a".to_string()]);
        assert_eq!(store.len(), 3);
        assert!(!store.contains(&"a".to_string()));
        assert_eq!(store.counters().evictions, 1);
    }

    #[test]
    fn test_access_protects_from_next_eviction() {
        let mut store = store(3);
        store.put("a".into(), 1, 1);
        store.put("b".into(), 2, 1);
        store.put("c".into(), 3, 1);

        assert_eq!(store.get(&"a".to_string()), Some(1));
        let evicted = store.put("d".into(), 4, 1);

        assert_eq!(evicted, vec!["b".to_string()]);
        assert!(store.contains(&"a".to_string()));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut store = store(2);
        store.put("a".into(), 1, 10);
        store.put("b".into(), 2, 10);

        let evicted = store.put("a".into(), 5, 4);

        assert!(evicted.is_empty());
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 14);
        assert_eq!(store.get(&"a".to_string()), Some(5));
    }

    #[test]
    fn test_ttl_expiry_is_a_miss() {
        let ttl = Duration::from_secs(300);
        let mut store: TieredStore<String, u32> =
            TieredStore::new(TierConfig::lru(4).with_ttl(ttl));
        let inserted = Instant::now();
        store.put_at("root".into(), 7, 1, inserted);

        assert_eq!(store.get_at(&"root".to_string(), inserted + ttl), Some(7));
        assert_eq!(
            store.get_at(&"root".to_string(), inserted + ttl + Duration::from_millis(1)),
            None
        );
        assert!(store.is_empty());

        let counters = store.counters();
        assert_eq!(counters.hits, 1);
        assert_eq!(counters.misses, 1);
        assert_eq!(counters.expirations, 1);
        assert_eq!(counters.evictions, 0);
    }

    #[test]
    fn test_reads_do_not_extend_ttl() {
        let ttl = Duration::from_secs(10);
        let mut store: TieredStore<String, u32> =
            TieredStore::new(TierConfig::lru(4).with_ttl(ttl));
        let inserted = Instant::now();
        store.put_at("root".into(), 1, 1, inserted);

        assert!(store
            .get_at(&"root".to_string(), inserted + Duration::from_secs(9))
            .is_some());
        assert!(store
            .get_at(&"root".to_string(), inserted + Duration::from_secs(11))
            .is_none());
    }

    #[test]
    fn test_fifo_store_evicts_oldest_insert_despite_reads() {
        let mut store: TieredStore<String, u32> =
            TieredStore::new(TierConfig::lru(2).with_policy(EvictionPolicyKind::Fifo));
        store.put("a".into(), 1, 1);
        store.put("b".into(), 2, 1);
        store.get(&"a".to_string());

        let evicted = store.put("c".into(), 3, 1);
        assert_eq!(evicted, vec!["a".to_string()]);
    }

    #[test]
    fn test_lookups_always_balance() {
        let mut store = store(2);
        store.get(&"missing".to_string());
        store.put("a".into(), 1, 1);
        store.get(&"a".to_string());
        store.get(&"a".to_string());
        store.invalidate(&"a".to_string());
        store.get(&"a".to_string());

        let counters = store.counters();
        assert_eq!(counters.hits, 2);
        assert_eq!(counters.misses, 2);
        assert_eq!(counters.lookups(), 4);
    }

    #[test]
    fn test_clear_and_retain() {
        let mut store = store(8);
        for (i, key) in ["src/a.rs", "src/b.rs", "tests/c.rs"].iter().enumerate() {
            store.put(key.to_string(), i as u32, 3);
        }

        let removed = store.retain(|key| !key.starts_with("src/"));
        assert_eq!(removed.len(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 3);

        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
        assert_eq!(store.total_bytes(), 0);
        // The policy forgot the cleared keys as well
        store.put("x".into(), 9, 1);
        assert_eq!(store.len(), 1);
    }
}
