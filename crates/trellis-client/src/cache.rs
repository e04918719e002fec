//! TTL document cache with exact, prefix, and pattern invalidation.
//!
//! Entries are keyed by (workspace, cache key) where the key distinguishes
//! plain document reads, tree-query reads, and existence checks. An entry is
//! never served once its age reaches the TTL — but TTL alone never
//! substitutes for explicit invalidation on mutation: every committed
//! write/mkdir/rm/mv invalidates the affected keys through this module.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use regex::Regex;
use serde_json::Value;

use trellis_store::{DocPath, WorkspaceId};

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries across all workspaces.
    pub capacity: usize,
    /// Time-to-live for every entry.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            capacity: 10_000,
            ttl: Duration::from_secs(30),
        }
    }
}

/// What a cache entry answers: a document read, a tree query, or an
/// existence check.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Value (or absence) of the document at a path.
    Doc(DocPath),
    /// Snapshot of a tree query at a prefix.
    Tree(DocPath),
    /// Result of an existence check at a path.
    Exists(DocPath),
}

impl CacheKey {
    /// The path or prefix this key is about.
    pub fn path(&self) -> &DocPath {
        match self {
            CacheKey::Doc(p) | CacheKey::Tree(p) | CacheKey::Exists(p) => p,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Doc(p) => write!(f, "doc:{}", p),
            CacheKey::Tree(p) => write!(f, "tree:{}", p),
            CacheKey::Exists(p) => write!(f, "exists:{}", p),
        }
    }
}

/// Cached answer, one variant per key kind. Absent documents cache as
/// `Doc(None)` so repeated misses stay off the store.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedValue {
    /// Document value; `None` means confirmed absent, `Some(Value::Null)` a
    /// tombstone.
    Doc(Option<Value>),
    /// Full tree-query snapshot.
    Tree(BTreeMap<DocPath, Value>),
    /// Existence answer.
    Exists(bool),
}

struct CacheEntry {
    value: CachedValue,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through to the store.
    pub misses: u64,
    /// Entries displaced by capacity pressure.
    pub evictions: u64,
    /// Entries removed by explicit invalidation.
    pub invalidations: u64,
    /// Current entry count.
    pub size: usize,
}

struct Inner {
    entries: LruCache<(WorkspaceId, CacheKey), CacheEntry>,
    stats: CacheStats,
}

/// Workspace-qualified TTL cache. An explicit component injected into the
/// data client and filesystem emulation — never ambient state.
pub struct DocumentCache {
    inner: Mutex<Inner>,
    config: CacheConfig,
}

impl DocumentCache {
    /// Creates a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::new(10_000).unwrap());
        DocumentCache {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            config,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Looks up an entry. Expired entries are dropped and count as misses.
    pub fn get(&self, workspace: &WorkspaceId, key: &CacheKey) -> Option<CachedValue> {
        let mut inner = self.lock();
        let composite = (workspace.clone(), key.clone());
        let hit = match inner.entries.get(&composite) {
            Some(entry) => {
                if entry.is_expired(self.config.ttl) {
                    None
                } else {
                    Some(entry.value.clone())
                }
            }
            None => None,
        };
        match hit {
            Some(value) => {
                inner.stats.hits += 1;
                Some(value)
            }
            None => {
                inner.entries.pop(&composite);
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Stores an entry, evicting the least recently used one at capacity.
    pub fn insert(&self, workspace: &WorkspaceId, key: CacheKey, value: CachedValue) {
        let mut inner = self.lock();
        let prev_len = inner.entries.len();
        inner.entries.push(
            (workspace.clone(), key),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
        if inner.entries.len() <= prev_len {
            inner.stats.evictions += 1;
        }
    }

    /// Invalidates everything whose answer could depend on `path`: the exact
    /// document entry, plus every tree-query and existence entry whose
    /// prefix contains the path at a segment boundary.
    pub fn invalidate_path(&self, workspace: &WorkspaceId, path: &DocPath) {
        self.remove_matching(workspace, |key| match key {
            CacheKey::Doc(p) => p == path,
            CacheKey::Tree(p) | CacheKey::Exists(p) => path.is_within(p),
        });
    }

    /// Invalidates everything at or under `prefix`, plus every tree-query
    /// and existence entry whose own prefix contains it. Used by rm/mv,
    /// which change entire subtrees.
    pub fn invalidate_prefix(&self, workspace: &WorkspaceId, prefix: &DocPath) {
        self.remove_matching(workspace, |key| match key {
            CacheKey::Doc(p) => p.is_within(prefix),
            CacheKey::Tree(p) | CacheKey::Exists(p) => {
                p.is_within(prefix) || prefix.is_within(p)
            }
        });
    }

    /// Invalidates every entry whose key string (`doc:/path`, `tree:/path`,
    /// `exists:/path`) matches the pattern.
    pub fn invalidate_pattern(&self, workspace: &WorkspaceId, pattern: &Regex) {
        self.remove_matching(workspace, |key| pattern.is_match(&key.to_string()));
    }

    fn remove_matching(&self, workspace: &WorkspaceId, predicate: impl Fn(&CacheKey) -> bool) {
        let mut inner = self.lock();
        let doomed: Vec<_> = inner
            .entries
            .iter()
            .filter(|((ws, key), _)| ws == workspace && predicate(key))
            .map(|(composite, _)| composite.clone())
            .collect();
        for composite in &doomed {
            inner.entries.pop(composite);
        }
        inner.stats.invalidations += doomed.len() as u64;
        if !doomed.is_empty() {
            tracing::trace!(
                "invalidated {} cache entries in workspace {}",
                doomed.len(),
                workspace
            );
        }
    }

    /// Drops every entry for one workspace.
    pub fn clear_workspace(&self, workspace: &WorkspaceId) {
        self.remove_matching(workspace, |_| true);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            size: inner.entries.len(),
            ..inner.stats.clone()
        }
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
