//! Background-context caching.
//!
//! Candidate background contexts are expensive to fetch, so they live in a
//! process-wide cache shared by every pipeline instance working against the
//! same candidate index. The [`ContextCacheRegistry`] hands out one cache
//! per index identity with insert-if-absent semantics; explicitly
//! registering the same identity twice is a fatal host error, not an
//! overwrite.
//!
//! Semantic scores are much cheaper but document-scoped; the [`ScoreCache`]
//! keys them by `(document id, candidate id)` so that interleaved or
//! repeated scoring within a document never recomputes, and documents never
//! poison each other's scores.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::sync::{self, Mutex};

/// Default maximum number of cached contexts per index.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default time-to-live of a cached context.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct CacheSlot {
    context: String,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheSlot>,
    // Insertion log for eviction; may contain superseded records, which are
    // detected by comparing instants.
    insertions: VecDeque<(String, Instant)>,
}

/// Bounded, TTL-evicting map from candidate id to background context.
///
/// Eviction is insertion-ordered: once the capacity is exceeded or entries
/// outlive the TTL, the oldest writes go first. Safe for concurrent use.
#[derive(Debug)]
pub struct ContextCache {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl ContextCache {
    /// Create a cache holding at most `capacity` contexts, each for at most
    /// `ttl`.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Look up the context for a candidate id, dropping it if expired.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<String> {
        let mut inner = sync::lock(&self.inner);
        let expired = match inner.entries.get(id) {
            None => return None,
            Some(slot) => slot.inserted_at.elapsed() >= self.ttl,
        };
        if expired {
            inner.entries.remove(id);
            return None;
        }
        inner.entries.get(id).map(|slot| slot.context.clone())
    }

    /// Insert a context, evicting expired and over-capacity entries.
    pub fn insert(&self, id: impl Into<String>, context: impl Into<String>) {
        let id = id.into();
        let now = Instant::now();
        let mut inner = sync::lock(&self.inner);
        inner.insertions.push_back((id.clone(), now));
        inner.entries.insert(
            id,
            CacheSlot {
                context: context.into(),
                inserted_at: now,
            },
        );
        while let Some((old_id, inserted_at)) = inner.insertions.front().cloned() {
            let expired = inserted_at.elapsed() >= self.ttl;
            let over_capacity = inner.entries.len() > self.capacity;
            if !expired && !over_capacity {
                break;
            }
            inner.insertions.pop_front();
            // A newer write may have superseded this record; only the slot
            // belonging to it is dropped.
            if let Some(slot) = inner.entries.get(&old_id) {
                if slot.inserted_at == inserted_at {
                    inner.entries.remove(&old_id);
                }
            }
        }
    }

    /// Number of contexts currently held (expired entries not yet evicted
    /// are counted).
    #[must_use]
    pub fn len(&self) -> usize {
        sync::lock(&self.inner).entries.len()
    }

    /// Whether the cache holds no contexts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide registry of context caches, one per candidate-index
/// identity.
///
/// Cloning the registry shares the underlying map; the registry is meant to
/// be created once by the host and handed to every pipeline.
#[derive(Debug, Clone, Default)]
pub struct ContextCacheRegistry {
    caches: Arc<DashMap<String, Arc<ContextCache>>>,
}

impl ContextCacheRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cache for an index identity, exactly once.
    ///
    /// # Panics
    ///
    /// Panics when the identity already has a cache. Double registration is
    /// a programming error in the host, not a recoverable condition.
    pub fn register(&self, index_identity: &str, cache: ContextCache) -> Arc<ContextCache> {
        match self.caches.entry(index_identity.to_string()) {
            Entry::Occupied(_) => panic!(
                "context cache for index '{index_identity}' already registered; \
                 duplicate creation indicates a faulty concurrency setup in the host"
            ),
            Entry::Vacant(slot) => slot.insert(Arc::new(cache)).clone(),
        }
    }

    /// Atomically get the cache for an index identity, creating it with
    /// `init` when absent. `init` runs at most once per identity.
    pub fn handle_with(
        &self,
        index_identity: &str,
        init: impl FnOnce() -> ContextCache,
    ) -> Arc<ContextCache> {
        self.caches
            .entry(index_identity.to_string())
            .or_insert_with(|| Arc::new(init()))
            .value()
            .clone()
    }

    /// The cache for an index identity, if one exists.
    #[must_use]
    pub fn get(&self, index_identity: &str) -> Option<Arc<ContextCache>> {
        self.caches
            .get(index_identity)
            .map(|entry| entry.value().clone())
    }

    /// Number of registered index identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Whether no cache has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

/// Per-pipeline memo of semantic scores keyed by document and candidate id.
#[derive(Debug, Default)]
pub struct ScoreCache {
    scores: HashMap<String, HashMap<String, f64>>,
}

impl ScoreCache {
    /// Create an empty score cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached score for a candidate within a document.
    #[must_use]
    pub fn get(&self, document_id: &str, candidate_id: &str) -> Option<f64> {
        self.scores.get(document_id)?.get(candidate_id).copied()
    }

    /// Cache a score for a candidate within a document.
    pub fn insert(&mut self, document_id: &str, candidate_id: &str, score: f64) {
        self.scores
            .entry(document_id.to_string())
            .or_default()
            .insert(candidate_id.to_string(), score);
    }

    /// Drop all scores cached for a document.
    pub fn remove_document(&mut self, document_id: &str) {
        self.scores.remove(document_id);
    }

    /// Total number of cached scores across documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.values().map(HashMap::len).sum()
    }

    /// Whether no score is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_round_trip() {
        let cache = ContextCache::default();
        cache.insert("672", "breast cancer associated");
        assert_eq!(cache.get("672").as_deref(), Some("breast cancer associated"));
        assert_eq!(cache.get("unknown"), None);
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let cache = ContextCache::new(16, Duration::ZERO);
        cache.insert("672", "ctx");
        assert_eq!(cache.get("672"), None);
    }

    #[test]
    fn capacity_evicts_oldest_insertions() {
        let cache = ContextCache::new(2, DEFAULT_TTL);
        cache.insert("a", "1");
        cache.insert("b", "2");
        cache.insert("c", "3");

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b").as_deref(), Some("2"));
        assert_eq!(cache.get("c").as_deref(), Some("3"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinsert_refreshes_the_entry() {
        let cache = ContextCache::new(2, DEFAULT_TTL);
        cache.insert("a", "old");
        cache.insert("a", "new");
        cache.insert("b", "2");

        // the superseded record for "a" must not evict the fresh value
        cache.insert("c", "3");
        assert_eq!(cache.get("a"), None); // "a" is now the oldest write
        assert_eq!(cache.get("b").as_deref(), Some("2"));
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }

    #[test]
    fn registry_hands_out_shared_caches() {
        let registry = ContextCacheRegistry::new();
        let first = registry.handle_with("index-a", ContextCache::default);
        let second = registry.handle_with("index-a", ContextCache::default);

        first.insert("672", "ctx");
        assert_eq!(second.get("672").as_deref(), Some("ctx"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn handle_with_initializes_at_most_once() {
        let registry = ContextCacheRegistry::new();
        let mut calls = 0;
        let _ = registry.handle_with("index-a", || {
            calls += 1;
            ContextCache::default()
        });
        let _ = registry.handle_with("index-a", || {
            calls += 1;
            ContextCache::default()
        });
        assert_eq!(calls, 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_is_fatal() {
        let registry = ContextCacheRegistry::new();
        registry.register("index-a", ContextCache::default());
        registry.register("index-a", ContextCache::default());
    }

    #[test]
    fn concurrent_handles_share_one_cache() {
        let registry = ContextCacheRegistry::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let registry = registry.clone();
                scope.spawn(move || {
                    let cache = registry.handle_with("shared", ContextCache::default);
                    cache.insert("id", "ctx");
                });
            }
        });
        assert_eq!(registry.len(), 1);
        let cache = registry.get("shared").unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn score_cache_is_keyed_by_document_and_candidate() {
        let mut scores = ScoreCache::new();
        scores.insert("doc-1", "672", 0.8);
        scores.insert("doc-2", "672", 0.3);

        assert_eq!(scores.get("doc-1", "672"), Some(0.8));
        assert_eq!(scores.get("doc-2", "672"), Some(0.3));
        assert_eq!(scores.get("doc-1", "675"), None);

        scores.remove_document("doc-1");
        assert_eq!(scores.get("doc-1", "672"), None);
        assert_eq!(scores.get("doc-2", "672"), Some(0.3));
    }
}
