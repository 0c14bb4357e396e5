//! The per-document disambiguation pipeline.
//!
//! A [`Pipeline`] wires the candidate source, semantic scorer, optional
//! admission gate and agglomerator together and runs them over one
//! document at a time: overlapping mentions are unified, unspecified
//! mentions dropped, the rest filtered, scored, gated and clustered, and
//! every surviving mention leaves with either an identifier or the
//! rejection sentinel.
//!
//! One pipeline instance processes mentions sequentially and holds no
//! cross-document state except the shared background-context cache, so
//! document-level parallelism is a matter of one pipeline per worker over
//! one [`ContextCacheRegistry`].

use std::sync::Arc;

use log::{debug, info};

use crate::agglomerate::Agglomerator;
use crate::candidate;
use crate::context::{ContextCache, ContextCacheRegistry};
use crate::error::{Error, Result};
use crate::filter;
use crate::gate::LearnedGate;
use crate::mention::{Document, UnificationStrategy};
use crate::normalize;
use crate::result::{DocumentResult, MentionOutcome, ResultEntry};
use crate::semantic::SemanticScorer;
use crate::sources::{CandidateSource, ContextIndex, ContextSimilarity};

/// Builder for [`Pipeline`]; construction fails fast on missing
/// collaborators.
#[derive(Default)]
pub struct PipelineBuilder {
    source: Option<Arc<dyn CandidateSource>>,
    index: Option<(String, Arc<dyn ContextIndex>)>,
    similarity: Option<Arc<dyn ContextSimilarity>>,
    registry: Option<ContextCacheRegistry>,
    gate: Option<LearnedGate>,
    agglomerator: Option<Agglomerator>,
    unification: Option<Vec<UnificationStrategy>>,
}

impl PipelineBuilder {
    /// Set the candidate source. Required.
    #[must_use]
    pub fn with_candidate_source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the context index together with its identity. Required.
    ///
    /// The identity keys the shared background-context cache; pipelines
    /// naming the same identity share one cache.
    #[must_use]
    pub fn with_context_index(
        mut self,
        identity: impl Into<String>,
        index: Arc<dyn ContextIndex>,
    ) -> Self {
        self.index = Some((identity.into(), index));
        self
    }

    /// Set the context similarity measure. Required.
    #[must_use]
    pub fn with_similarity(mut self, similarity: Arc<dyn ContextSimilarity>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Share a cache registry with other pipelines. A fresh private
    /// registry is used when none is given.
    #[must_use]
    pub fn with_registry(mut self, registry: ContextCacheRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Install the learned admission gate.
    #[must_use]
    pub fn with_gate(mut self, gate: LearnedGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Replace the default agglomerator.
    #[must_use]
    pub fn with_agglomerator(mut self, agglomerator: Agglomerator) -> Self {
        self.agglomerator = Some(agglomerator);
        self
    }

    /// Replace the default mention unification passes
    /// (longer-mention-wins).
    #[must_use]
    pub fn with_unification(mut self, strategies: Vec<UnificationStrategy>) -> Self {
        self.unification = Some(strategies);
        self
    }

    /// Assemble the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the candidate source, context
    /// index or similarity measure is missing.
    pub fn build(self) -> Result<Pipeline> {
        let source = self
            .source
            .ok_or_else(|| Error::config("candidate source not set"))?;
        let (identity, index) = self
            .index
            .ok_or_else(|| Error::config("context index not set"))?;
        let similarity = self
            .similarity
            .ok_or_else(|| Error::config("context similarity function not set"))?;

        let registry = self.registry.unwrap_or_default();
        let contexts = registry.handle_with(&identity, ContextCache::default);
        Ok(Pipeline {
            source,
            scorer: SemanticScorer::new(index, similarity, contexts),
            gate: self.gate,
            agglomerator: self.agglomerator.unwrap_or_default(),
            unification: self
                .unification
                .unwrap_or_else(|| vec![UnificationStrategy::LongerFirst]),
        })
    }
}

/// Resolves the gene mentions of documents to identifiers.
pub struct Pipeline {
    source: Arc<dyn CandidateSource>,
    scorer: SemanticScorer,
    gate: Option<LearnedGate>,
    agglomerator: Agglomerator,
    unification: Vec<UnificationStrategy>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("gate", &self.gate.is_some())
            .field("agglomerator", &self.agglomerator)
            .field("unification", &self.unification)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Start building a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Map every mention of `document` to an identifier or a rejection.
    ///
    /// Unification and the unspecified-mention drop shrink
    /// `document.mentions` in place; the returned outcomes run parallel
    /// to the surviving mentions, ordered by span.
    pub fn map_document(&self, document: &mut Document) -> Result<DocumentResult> {
        document.unify_mentions(&self.unification);
        document.mentions.retain(|mention| {
            let drop = normalize::is_unspecified(&mention.normalized_text)
                || normalize::is_nondescriptive(&mention.normalized_text);
            if drop {
                debug!("dropping unspecified mention '{}'", mention.text);
            }
            !drop
        });
        for mention in &mut document.mentions {
            if mention.document_id.is_empty() {
                mention.document_id = document.id.clone();
            }
        }

        let mut mappings = Vec::with_capacity(document.mentions.len());
        for mention in &document.mentions {
            let originals = self.source.retrieve(mention)?;
            let mut mapping = filter::filter_candidates(mention, originals);

            if !mapping.filtered_candidates.is_empty() {
                self.scorer.score(
                    &document.id,
                    &mention.document_context,
                    &mut mapping.filtered_candidates,
                    false,
                )?;
                let mut ordered = mapping.filtered_candidates.clone();
                candidate::sort_by_semantic_score(&mut ordered);

                // the semantically strongest candidate becomes the pick
                if let Some(first) = ordered.first() {
                    mapping.best_candidate = Some(first.clone());
                    mapping.result_entry = ResultEntry::Hit(first.clone());
                }
                mapping.semantically_ordered_candidates = Some(ordered);

                if let (Some(gate), Some(best)) = (&self.gate, mapping.best_candidate.clone()) {
                    let ranked = mapping
                        .semantically_ordered_candidates
                        .as_deref()
                        .unwrap_or(&mapping.filtered_candidates);
                    let decision = gate.admit(mention, mapping.match_type, ranked, &best);
                    if !decision.is_admit() {
                        debug!("gate rejected mention '{}': {:?}", mention.text, decision);
                        mapping.best_candidate = None;
                        mapping.result_entry = ResultEntry::Rejection;
                    }
                }
            }
            mappings.push(mapping);
        }

        self.agglomerator.agglomerate(document, &mut mappings);

        // Final pass: rejections stand; everything else takes its possibly
        // consensus-overwritten best candidate.
        let mut outcomes = Vec::with_capacity(mappings.len());
        for (mention, mut mapping) in document.mentions.iter().zip(mappings) {
            if !mapping.is_rejected() {
                if let Some(best) = mapping.best_candidate.clone() {
                    mapping.result_entry = ResultEntry::Hit(best);
                }
            }
            outcomes.push(MentionOutcome {
                span: mention.span,
                text: mention.text.clone(),
                mapping,
            });
        }
        self.scorer.forget_document(&document.id);

        let result = DocumentResult {
            document_id: document.id.clone(),
            outcomes,
        };
        info!(
            "document {}: {} mentions mapped, {} rejected",
            result.document_id,
            result.outcomes.len(),
            result.rejection_count()
        );
        Ok(result)
    }
}
