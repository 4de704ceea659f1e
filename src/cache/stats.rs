use serde::Serialize;

use super::store::StoreCounters;
use super::types::{EvictionPolicyKind, Tier};

/// Snapshot of one tier, taken under that tier's lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub tier: Tier,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub current_size: usize,
    pub max_entries: usize,
    pub total_bytes: usize,
    pub ttl_secs: Option<u64>,
    pub policy: EvictionPolicyKind,
}

impl TierStats {
    pub(crate) fn from_counters(
        tier: Tier,
        counters: StoreCounters,
        current_size: usize,
        max_entries: usize,
        total_bytes: usize,
        ttl_secs: Option<u64>,
        policy: EvictionPolicyKind,
    ) -> Self {
        Self {
            tier,
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expirations: counters.expirations,
            current_size,
            max_entries,
            total_bytes,
            ttl_secs,
            policy,
        }
    }

    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit rate in percent, 0 when nothing was looked up yet
    pub fn hit_rate(&self) -> f32 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f32 / total as f32 * 100.0,
        }
    }
}

/// Per-tier statistics for the whole coordinator
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub tiers: Vec<TierStats>,
    /// Files whose last fingerprint is remembered for the metadata fast path
    pub fingerprints_tracked: usize,
}

impl CacheStats {
    pub fn tier(&self, tier: Tier) -> Option<&TierStats> {
        self.tiers.iter().find(|stats| stats.tier == tier)
    }

    pub fn total_entries(&self) -> usize {
        self.tiers.iter().map(|stats| stats.current_size).sum()
    }

    pub fn total_hits(&self) -> u64 {
        self.tiers.iter().map(|stats| stats.hits).sum()
    }

    pub fn total_misses(&self) -> u64 {
        self.tiers.iter().map(|stats| stats.misses).sum()
    }

    /// Format cache stats for display
    pub fn format(&self) -> String {
        let mut out = String::from("Cache Statistics:\n");
        for stats in &self.tiers {
            let ttl = stats
                .ttl_secs
                .map(|secs| format!(", ttl {}s", secs))
                .unwrap_or_default();
            out.push_str(&format!(
                "  {:<16} {:>4}/{:<4} entries  {:>8.1} KB  hit rate {:>5.1}% ({} hits, {} misses)  {} evicted, {} expired{}\n",
                stats.tier.as_str(),
                stats.current_size,
                stats.max_entries,
                stats.total_bytes as f64 / 1024.0,
                stats.hit_rate(),
                stats.hits,
                stats.misses,
                stats.evictions,
                stats.expirations,
                ttl,
            ));
        }

        let total = self.total_entries();
        if total > 0 {
            out.push_str(&format!(
                "  Total: {} cached results across {} tiers, {} fingerprints tracked",
                total,
                self.tiers.len(),
                self.fingerprints_tracked
            ));
        } else {
            out.push_str("  Cache is empty; it fills as files are analyzed");
        }
        out
    }
}
