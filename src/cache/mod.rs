// Gateway module for cache - follows the Train Station Pattern
// All external access must go through this gateway

mod coordinator;
mod error;
mod fingerprint;
mod policy;
mod stats;
mod store;
mod types;

pub use coordinator::{CacheCoordinator, CoordinatorConfig};
pub use error::{ConfigError, FileError};
pub use fingerprint::{hash_bytes, Fingerprint, FingerprintEngine};
pub use policy::{build_policy, EvictionPolicy, FifoPolicy, LruPolicy};
pub use stats::{CacheStats, TierStats};
pub use store::{StoreCounters, TieredStore};
pub use types::{
    CacheEntry, CacheKey, EvictionPolicyKind, Lookup, Payload, Target, Tier, TierConfig,
};

