//! Context-similarity scoring of candidates.
//!
//! The scorer compares the mention's document context against each
//! candidate's background context and records the similarity as the
//! candidate's semantic score. Background contexts come from a
//! [`ContextIndex`] and are memoized in the process-wide [`ContextCache`];
//! computed scores are memoized per `(document id, candidate id)` so a
//! candidate surfacing for several mentions of one document is scored
//! exactly once.
//!
//! Candidates whose background context cannot be found keep their semantic
//! score unset; absence is information the downstream gate acts on, so it
//! is never cached and never defaulted.

use std::collections::HashSet;
use std::sync::Arc;

use crate::candidate::{self, CandidateHit};
use crate::context::{ContextCache, ScoreCache};
use crate::error::Result;
use crate::sources::{ContextIndex, ContextSimilarity};
use crate::sync::{self, Mutex};

/// Scores candidates by similarity between document and background
/// contexts.
pub struct SemanticScorer {
    index: Arc<dyn ContextIndex>,
    similarity: Arc<dyn ContextSimilarity>,
    contexts: Arc<ContextCache>,
    scores: Mutex<ScoreCache>,
}

impl std::fmt::Debug for SemanticScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticScorer")
            .field("contexts", &self.contexts.len())
            .finish_non_exhaustive()
    }
}

impl SemanticScorer {
    /// Create a scorer backed by a context index, a similarity measure and
    /// the shared context cache for that index.
    #[must_use]
    pub fn new(
        index: Arc<dyn ContextIndex>,
        similarity: Arc<dyn ContextSimilarity>,
        contexts: Arc<ContextCache>,
    ) -> Self {
        Self {
            index,
            similarity,
            contexts,
            scores: Mutex::new(ScoreCache::new()),
        }
    }

    /// Assign semantic scores to `candidates` for a mention of the given
    /// document, then optionally resort them by semantic score. Returns
    /// the leading candidate after scoring, or `None` for an empty list.
    ///
    /// Background contexts missing from the cache are fetched in one batch.
    /// Candidates that still have no context afterwards keep their score
    /// unset. When `resort` is set the slice is stably reordered by
    /// descending semantic score, unscored candidates last.
    pub fn score(
        &self,
        document_id: &str,
        document_context: &str,
        candidates: &mut [CandidateHit],
        resort: bool,
    ) -> Result<Option<CandidateHit>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        self.fetch_missing_contexts(document_id, candidates)?;

        let mut scores = sync::lock(&self.scores);
        for hit in candidates.iter_mut() {
            if let Some(score) = scores.get(document_id, &hit.id) {
                hit.semantic_score = Some(score);
            } else if let Some(context) = self.contexts.get(&hit.id) {
                let score = self.similarity.similarity(document_context, &context);
                hit.semantic_score = Some(score);
                scores.insert(document_id, &hit.id, score);
            } else {
                hit.semantic_score = None;
            }
        }
        drop(scores);

        if resort {
            candidate::sort_by_semantic_score(candidates);
        }
        Ok(candidates.first().cloned())
    }

    /// Drop the score memo for a finished document.
    pub fn forget_document(&self, document_id: &str) {
        sync::lock(&self.scores).remove_document(document_id);
    }

    fn fetch_missing_contexts(
        &self,
        document_id: &str,
        candidates: &[CandidateHit],
    ) -> Result<()> {
        let scores = sync::lock(&self.scores);
        let mut seen = HashSet::new();
        let mut missing = Vec::new();
        for hit in candidates {
            // A memoized score means the context was already consulted.
            if scores.get(document_id, &hit.id).is_some() {
                continue;
            }
            if self.contexts.get(&hit.id).is_some() {
                continue;
            }
            if seen.insert(hit.id.clone()) {
                missing.push(hit.id.clone());
            }
        }
        drop(scores);

        if missing.is_empty() {
            return Ok(());
        }
        log::debug!(
            "fetching {} background contexts for document {}",
            missing.len(),
            document_id
        );
        let fetched = self.index.batch_contexts(&missing)?;
        if fetched.len() < missing.len() {
            log::warn!(
                "{} of {} requested background contexts are unknown to the index",
                missing.len() - fetched.len(),
                missing.len()
            );
        }
        for (id, context) in fetched {
            self.contexts.insert(id, context);
        }
        Ok(())
    }
}
