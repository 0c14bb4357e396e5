//! Collaborator interfaces supplied by the host.
//!
//! The engine only decides; retrieval, context indexing, and similarity
//! scoring are injected. Implementations are expected to be shared across
//! pipeline instances (`Arc`), hence the `Send + Sync` bounds. All calls
//! are synchronous; callers needing timeouts wrap these externally.

use std::collections::HashMap;

use crate::candidate::CandidateHit;
use crate::mention::Mention;
use crate::Result;

/// Lexical candidate retrieval.
pub trait CandidateSource: Send + Sync {
    /// Return candidates for a mention, sorted descending by
    /// `mention_score` with all exact matches forming the leading prefix.
    ///
    /// The engine relies on that ordering without re-validating it; a
    /// violating implementation silently degrades match-type
    /// classification. An empty list is valid and leads to rejection.
    fn retrieve(&self, mention: &Mention) -> Result<Vec<CandidateHit>>;
}

/// Background-context lookup for candidate identifiers.
pub trait ContextIndex: Send + Sync {
    /// Fetch context strings for the given identifiers in one call.
    ///
    /// `ids` contains each identifier at most once. Identifiers unknown to
    /// the index are simply absent from the returned map, not an error.
    fn batch_contexts(&self, ids: &[String]) -> Result<HashMap<String, String>>;
}

/// Similarity between a mention's document context and a candidate's
/// background context. Treated as symmetric and bounded; normalization is
/// the implementation's concern.
pub trait ContextSimilarity: Send + Sync {
    /// Score the similarity of two context strings.
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Candidate source backed by a fixed table keyed by normalized mention
/// text.
///
/// Intended for tests and small in-memory lexica; production hosts wrap
/// their search index instead.
#[derive(Debug, Clone, Default)]
pub struct StaticCandidateSource {
    candidates: HashMap<String, Vec<CandidateHit>>,
}

impl StaticCandidateSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the candidate list returned for a normalized mention text.
    #[must_use]
    pub fn with_candidates(
        mut self,
        normalized: impl Into<String>,
        hits: Vec<CandidateHit>,
    ) -> Self {
        self.candidates.insert(normalized.into(), hits);
        self
    }
}

impl CandidateSource for StaticCandidateSource {
    fn retrieve(&self, mention: &Mention) -> Result<Vec<CandidateHit>> {
        Ok(self
            .candidates
            .get(&mention.normalized_text)
            .cloned()
            .unwrap_or_default())
    }
}

/// Context index backed by a fixed id-to-context table.
#[derive(Debug, Clone, Default)]
pub struct StaticContextIndex {
    contexts: HashMap<String, String>,
}

impl StaticContextIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the background context for a candidate id.
    #[must_use]
    pub fn with_context(mut self, id: impl Into<String>, context: impl Into<String>) -> Self {
        self.contexts.insert(id.into(), context.into());
        self
    }
}

impl ContextIndex for StaticContextIndex {
    fn batch_contexts(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.contexts.get(id).map(|ctx| (id.clone(), ctx.clone())))
            .collect())
    }
}
