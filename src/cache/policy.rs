use lru::LruCache;
use std::fmt;
use std::hash::Hash;

use super::types::EvictionPolicyKind;

/// Decides which key a full store gives up next.
///
/// The store reports every insert, read and removal; the policy keeps its own
/// ordering and never sees values. All hooks are O(1) amortized.
pub trait EvictionPolicy<K>: Send + fmt::Debug {
    /// A key was inserted or overwritten
    fn on_insert(&mut self, key: &K);

    /// A key was read
    fn on_access(&mut self, key: &K);

    /// A key left the store for any reason other than `next_victim`
    fn on_remove(&mut self, key: &K);

    /// Remove and return the key to evict, if any
    fn next_victim(&mut self) -> Option<K>;

    fn clear(&mut self);

    fn kind(&self) -> EvictionPolicyKind;
}

/// Least-recently-used ordering
#[derive(Debug)]
pub struct LruPolicy<K: Hash + Eq> {
    order: LruCache<K, ()>,
}

impl<K: Hash + Eq> LruPolicy<K> {
    pub fn new() -> Self {
        Self {
            order: LruCache::unbounded(),
        }
    }
}

impl<K: Hash + Eq> Default for LruPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for LruPolicy<K>
where
    K: Hash + Eq + Clone + Send + fmt::Debug,
{
    fn on_insert(&mut self, key: &K) {
        self.order.put(key.clone(), ());
    }

    fn on_access(&mut self, key: &K) {
        self.order.promote(key);
    }

    fn on_remove(&mut self, key: &K) {
        self.order.pop(key);
    }

    fn next_victim(&mut self) -> Option<K> {
        self.order.pop_lru().map(|(key, ())| key)
    }

    fn clear(&mut self) {
        self.order.clear();
    }

    fn kind(&self) -> EvictionPolicyKind {
        EvictionPolicyKind::Lru
    }
}

/// Insertion ordering; reads do not protect an entry
#[derive(Debug)]
pub struct FifoPolicy<K: Hash + Eq> {
    order: LruCache<K, ()>,
}

impl<K: Hash + Eq> FifoPolicy<K> {
    pub fn new() -> Self {
        Self {
            order: LruCache::unbounded(),
        }
    }
}

impl<K: Hash + Eq> Default for FifoPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for FifoPolicy<K>
where
    K: Hash + Eq + Clone + Send + fmt::Debug,
{
    fn on_insert(&mut self, key: &K) {
        // An overwrite counts as a fresh insertion
        self.order.put(key.clone(), ());
    }

    fn on_access(&mut self, _key: &K) {}

    fn on_remove(&mut self, key: &K) {
        self.order.pop(key);
    }

    fn next_victim(&mut self) -> Option<K> {
        self.order.pop_lru().map(|(key, ())| key)
    }

    fn clear(&mut self) {
        self.order.clear();
    }

    fn kind(&self) -> EvictionPolicyKind {
        EvictionPolicyKind::Fifo
    }
}

/// Build the policy named by a tier configuration
pub fn build_policy<K>(kind: EvictionPolicyKind) -> Box<dyn EvictionPolicy<K>>
where
    K: Hash + Eq + Clone + Send + fmt::Debug + 'static,
{
    match kind {
        EvictionPolicyKind::Lru => Box::new(LruPolicy::new()),
        EvictionPolicyKind::Fifo => Box::new(FifoPolicy::new()),
    }
}
