use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, FileError};
use super::fingerprint::{canonical, hash_bytes, FingerprintEngine};
use super::stats::{CacheStats, TierStats};
use super::store::TieredStore;
use super::types::{CacheKey, Lookup, Payload, Target, Tier, TierConfig};
use crate::constants::{
    DEFAULT_PROJECT_SUMMARY_MAX_ENTRIES, DEFAULT_PROJECT_SUMMARY_TTL_SECS, DEFAULT_TIER_MAX_ENTRIES,
};

type StoredValue = Arc<dyn Any + Send + Sync>;

/// Tier limits for a coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub content: TierConfig,
    pub structure: TierConfig,
    pub model_result: TierConfig,
    pub project_summary: TierConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            content: TierConfig::lru(DEFAULT_TIER_MAX_ENTRIES),
            structure: TierConfig::lru(DEFAULT_TIER_MAX_ENTRIES),
            model_result: TierConfig::lru(DEFAULT_TIER_MAX_ENTRIES),
            project_summary: TierConfig::lru(DEFAULT_PROJECT_SUMMARY_MAX_ENTRIES)
                .with_ttl(Duration::from_secs(DEFAULT_PROJECT_SUMMARY_TTL_SECS)),
        }
    }
}

impl CoordinatorConfig {
    pub fn tier(&self, tier: Tier) -> &TierConfig {
        match tier {
            Tier::Content => &self.content,
            Tier::Structure => &self.structure,
            Tier::ModelResult => &self.model_result,
            Tier::ProjectSummary => &self.project_summary,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for tier in Tier::ALL {
            let config = self.tier(tier);
            if config.max_entries == 0 {
                return Err(ConfigError::ZeroCapacity { tier });
            }
            if config.ttl.is_some_and(|ttl| ttl.is_zero()) {
                return Err(ConfigError::ZeroTtl { tier });
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct TierState {
    store: TieredStore<CacheKey, StoredValue>,
    /// Latest key stored per file and payload type, so a new fingerprint
    /// supersedes the entry of the previous one
    current: HashMap<(PathBuf, TypeId), CacheKey>,
}

impl TierState {
    fn forget_slot(&mut self, key: &CacheKey) {
        if let Some(path) = key.path() {
            let slot = (path.to_path_buf(), key.payload());
            if self.current.get(&slot) == Some(key) {
                self.current.remove(&slot);
            }
        }
    }
}

/// Front door of the analysis cache.
///
/// Owns one store per tier, each behind its own lock; a slow computation on
/// one tier never blocks another, and compute functions run with no lock held.
/// Concurrent misses on the same key each compute and the last store wins.
/// Build it once at startup and share it as `Arc<CacheCoordinator>`.
#[derive(Debug)]
pub struct CacheCoordinator {
    config: CoordinatorConfig,
    fingerprints: FingerprintEngine,
    tiers: Vec<Mutex<TierState>>,
}

impl CacheCoordinator {
    /// Create a coordinator, rejecting invalid tier limits before any traffic
    pub fn new(config: CoordinatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Coordinator with the default limits, which always validate
    pub fn with_defaults() -> Self {
        Self::build(CoordinatorConfig::default())
    }

    fn build(config: CoordinatorConfig) -> Self {
        let tiers = Tier::ALL
            .iter()
            .map(|&tier| {
                Mutex::new(TierState {
                    store: TieredStore::new(config.tier(tier).clone()),
                    current: HashMap::new(),
                })
            })
            .collect();

        Self {
            config,
            fingerprints: FingerprintEngine::new(),
            tiers,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Return the cached value for `target` in `tier`, or run `compute`, cache and return it.
    ///
    /// File errors from fingerprinting and errors from `compute` are returned
    /// unchanged and never cached.
    pub fn get_or_compute<T, E, F>(
        &self,
        tier: Tier,
        target: &Target,
        compute: F,
    ) -> Result<Lookup<T>, E>
    where
        T: Payload,
        E: From<FileError>,
        F: FnOnce(&Target) -> Result<T, E>,
    {
        let key = self.derive_key::<T>(tier, target)?;
        if let Some(value) = self.lookup::<T>(&key) {
            return Ok(Lookup { value, hit: true });
        }

        debug!(tier = %tier, target = %target, "cache miss");
        let value = Arc::new(compute(target)?);
        self.store(key, target, Arc::clone(&value));
        Ok(Lookup { value, hit: false })
    }

    /// Async flavour of [`get_or_compute`](Self::get_or_compute) for slow
    /// computations such as model calls
    pub async fn get_or_compute_async<T, E, F, Fut>(
        &self,
        tier: Tier,
        target: &Target,
        compute: F,
    ) -> Result<Lookup<T>, E>
    where
        T: Payload,
        E: From<FileError>,
        F: FnOnce(Target) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.derive_key::<T>(tier, target)?;
        if let Some(value) = self.lookup::<T>(&key) {
            return Ok(Lookup { value, hit: true });
        }

        debug!(tier = %tier, target = %target, "cache miss");
        let value = Arc::new(compute(target.clone()).await?);
        self.store(key, target, Arc::clone(&value));
        Ok(Lookup { value, hit: false })
    }

    /// Drop everything cached for `path`: its content and structure entries,
    /// its remembered fingerprint, and project summaries whose root contains it.
    /// Model results are keyed by content and stay valid.
    pub fn invalidate_path(&self, path: &Path) -> usize {
        let path = resolve_for_removal(path);
        self.fingerprints.forget(&path);

        let mut removed = 0;
        for tier in Tier::ALL {
            let mut state = self.tiers[tier.index()].lock();
            let gone = if tier.is_fingerprinted() {
                state.store.retain(|key| key.path() != Some(path.as_path()))
            } else {
                state
                    .store
                    .retain(|key| !key.path().is_some_and(|root| path.starts_with(root)))
            };
            state.current.retain(|(slot_path, _), _| slot_path != &path);
            removed += gone.len();
        }

        debug!(path = %path.display(), removed, "invalidated path");
        removed
    }

    /// Empty one tier, or every tier when `tier` is `None`. Counters are kept.
    pub fn clear(&self, tier: Option<Tier>) -> usize {
        let tiers = match tier {
            Some(tier) => vec![tier],
            None => Tier::ALL.to_vec(),
        };

        let mut removed = 0;
        for tier in tiers {
            let mut state = self.tiers[tier.index()].lock();
            removed += state.store.clear();
            state.current.clear();
        }
        if tier.is_none() {
            self.fingerprints.clear();
        }

        info!(
            tier = tier.map(Tier::as_str).unwrap_or("all"),
            removed, "cache cleared"
        );
        removed
    }

    /// Snapshot per-tier statistics. Each tier is read under its own lock.
    pub fn stats(&self) -> CacheStats {
        let tiers = Tier::ALL
            .iter()
            .map(|&tier| {
                let state = self.tiers[tier.index()].lock();
                let config = state.store.config();
                TierStats::from_counters(
                    tier,
                    state.store.counters(),
                    state.store.len(),
                    config.max_entries,
                    state.store.total_bytes(),
                    config.ttl.map(|ttl| ttl.as_secs()),
                    config.eviction_policy,
                )
            })
            .collect();

        CacheStats {
            tiers,
            fingerprints_tracked: self.fingerprints.len(),
        }
    }

    fn derive_key<T: Payload>(&self, tier: Tier, target: &Target) -> Result<CacheKey, FileError> {
        let payload = TypeId::of::<T>();
        let key = match target {
            Target::Path(path) if tier.is_fingerprinted() => {
                let fingerprint = self.fingerprints.fingerprint(path)?;
                CacheKey::new(
                    tier,
                    Some(fingerprint.path),
                    fingerprint.content_hash,
                    payload,
                )
            }
            Target::Path(path) => {
                let root = canonical(path)?;
                let digest = hash_bytes(root.to_string_lossy().as_bytes());
                CacheKey::new(tier, Some(root), digest, payload)
            }
            Target::Prompt {
                content,
                instruction,
            } => {
                let composite = format!(
                    "{}:{}",
                    hash_bytes(content.as_bytes()),
                    hash_bytes(instruction.as_bytes())
                );
                CacheKey::new(tier, None, hash_bytes(composite.as_bytes()), payload)
            }
        };
        Ok(key)
    }

    fn lookup<T: Payload>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let mut state = self.tiers[key.tier().index()].lock();
        let stored = state.store.get(key)?;
        match stored.downcast::<T>() {
            Ok(value) => {
                trace!(tier = %key.tier(), digest = key.digest(), "cache hit");
                Some(value)
            }
            Err(_) => {
                // Unreachable while the payload type is part of the key
                warn!(tier = %key.tier(), "cached payload has an unexpected type; dropping it");
                state.store.invalidate(key);
                state.forget_slot(key);
                None
            }
        }
    }

    fn store<T: Payload>(&self, key: CacheKey, target: &Target, value: Arc<T>) {
        let tier = key.tier();
        let tracks_file = tier.is_fingerprinted() && target.as_path().is_some();

        // The file may have changed while computing; such a result is returned but not kept
        if let (true, Some(path)) = (tracks_file, target.as_path()) {
            match self.fingerprints.fingerprint(path) {
                Ok(fingerprint) if fingerprint.content_hash == key.digest() => {}
                Ok(_) => {
                    debug!(tier = %tier, path = %path.display(), "file changed during compute; result not cached");
                    return;
                }
                Err(err) => {
                    debug!(tier = %tier, error = %err, "file vanished during compute; result not cached");
                    return;
                }
            }
        }

        let size = value.size_estimate();
        let stored: StoredValue = value;
        let mut state = self.tiers[tier.index()].lock();

        if tracks_file {
            if let Some(path) = key.path() {
                let slot = (path.to_path_buf(), key.payload());
                if let Some(previous) = state.current.insert(slot, key.clone()) {
                    if previous != key && state.store.invalidate(&previous) {
                        debug!(tier = %tier, path = %path.display(), "superseded stale entry");
                    }
                }
            }
        }

        let evicted = state.store.put(key, stored, size);
        for victim in &evicted {
            trace!(tier = %tier, digest = victim.digest(), "evicted");
            state.forget_slot(victim);
        }
        drop(state);

        if tier.is_fingerprinted() {
            for path in evicted.iter().filter_map(CacheKey::path) {
                self.release_fingerprint(path);
            }
        }
    }

    /// Forget the fingerprint of `path` once no fingerprinted tier holds an entry for it.
    /// Tiers are locked one at a time.
    fn release_fingerprint(&self, path: &Path) {
        let referenced = Tier::ALL
            .iter()
            .filter(|tier| tier.is_fingerprinted())
            .any(|tier| {
                self.tiers[tier.index()]
                    .lock()
                    .current
                    .keys()
                    .any(|(slot_path, _)| slot_path == path)
            });
        if !referenced {
            trace!(path = %path.display(), "released fingerprint");
            self.fingerprints.forget(path);
        }
    }
}

/// Best-effort canonical form of a path that may no longer exist
fn resolve_for_removal(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|dir| dir.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}
