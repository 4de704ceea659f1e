use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An independently configured cache partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Raw file text
    Content,
    /// Parsed structure (symbols, per-function complexity)
    Structure,
    /// Model-assisted analysis output
    ModelResult,
    /// Aggregate project layout
    ProjectSummary,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::Content,
        Tier::Structure,
        Tier::ModelResult,
        Tier::ProjectSummary,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Tier::Content => 0,
            Tier::Structure => 1,
            Tier::ModelResult => 2,
            Tier::ProjectSummary => 3,
        }
    }

    /// Whether path targets in this tier are keyed by a content fingerprint.
    /// The project-summary tier keys on the root path alone and relies on its TTL.
    pub fn is_fingerprinted(self) -> bool {
        !matches!(self, Tier::ProjectSummary)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Content => "content",
            Tier::Structure => "structure",
            Tier::ModelResult => "model-result",
            Tier::ProjectSummary => "project-summary",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "content" => Ok(Tier::Content),
            "structure" | "ast" => Ok(Tier::Structure),
            "model-result" | "model" => Ok(Tier::ModelResult),
            "project-summary" | "project" => Ok(Tier::ProjectSummary),
            other => Err(format!(
                "unknown cache tier '{}' (expected content, structure, model-result or project-summary)",
                other
            )),
        }
    }
}

/// Which eviction strategy a tier uses once it is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicyKind {
    /// Evict the entry with the oldest last access
    #[default]
    Lru,
    /// Evict the oldest insertion, ignoring reads
    Fifo,
}

/// Per-tier limits, fixed when the coordinator is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierConfig {
    pub max_entries: usize,
    pub ttl: Option<Duration>,
    pub eviction_policy: EvictionPolicyKind,
}

impl TierConfig {
    /// LRU tier without expiry
    pub fn lru(max_entries: usize) -> Self {
        Self {
            max_entries,
            ttl: None,
            eviction_policy: EvictionPolicyKind::Lru,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_policy(mut self, policy: EvictionPolicyKind) -> Self {
        self.eviction_policy = policy;
        self
    }
}

/// What a cached result is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A file, or a project root for the project-summary tier
    Path(PathBuf),
    /// A content + instruction pair, used for model-assisted results
    Prompt {
        content: Arc<str>,
        instruction: Arc<str>,
    },
}

impl Target {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Target::Path(path.into())
    }

    pub fn prompt(content: impl Into<Arc<str>>, instruction: impl Into<Arc<str>>) -> Self {
        Target::Prompt {
            content: content.into(),
            instruction: instruction.into(),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Target::Path(path) => Some(path),
            Target::Prompt { .. } => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Path(path) => write!(f, "{}", path.display()),
            Target::Prompt {
                content,
                instruction,
            } => write!(
                f,
                "prompt ({} bytes content, {} bytes instruction)",
                content.len(),
                instruction.len()
            ),
        }
    }
}

/// Key of a cache entry.
///
/// The digest is the content hash for fingerprinted file targets, the hash of
/// the canonical path for path-only tiers, and a composite of content and
/// instruction hashes for prompt targets. The payload type takes part in
/// equality so results of different types never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    tier: Tier,
    path: Option<PathBuf>,
    digest: String,
    payload: TypeId,
}

impl CacheKey {
    pub(crate) fn new(tier: Tier, path: Option<PathBuf>, digest: String, payload: TypeId) -> Self {
        Self {
            tier,
            path,
            digest,
            payload,
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// The file or project root this key belongs to, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub(crate) fn payload(&self) -> TypeId {
        self.payload
    }
}

/// A stored value and its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    pub key: K,
    pub value: V,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    pub size_estimate: usize,
}

/// Anything the coordinator can cache
pub trait Payload: Any + Send + Sync {
    /// Approximate heap footprint in bytes, reported in statistics
    fn size_estimate(&self) -> usize;
}

impl Payload for String {
    fn size_estimate(&self) -> usize {
        self.len()
    }
}

impl<T: Payload> Payload for Vec<T> {
    fn size_estimate(&self) -> usize {
        self.iter().map(Payload::size_estimate).sum()
    }
}

/// Result of a get-or-compute call
#[derive(Debug)]
pub struct Lookup<T> {
    pub value: Arc<T>,
    /// True when the value came from the cache
    pub hit: bool,
}

impl<T> Lookup<T> {
    pub fn into_value(self) -> Arc<T> {
        self.value
    }
}
