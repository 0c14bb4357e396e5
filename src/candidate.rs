//! Candidate hits produced by the lexical retriever.

use serde::{Deserialize, Serialize};

/// One lexical match for a mention, retrieved from the candidate index.
///
/// Carries the gene identifier, the synonym string that matched, and the
/// retriever's lexical confidence. The semantic score is unset until the
/// semantic scorer has compared the candidate's background context against
/// the mention's document context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateHit {
    /// Gene-database identifier, e.g. an NCBI Gene id.
    pub id: String,
    /// The synonym string in the index that produced this hit.
    pub synonym: String,
    /// Lexical match confidence from the retriever, clamped to `[0.0, 1.0]`.
    pub mention_score: f64,
    /// Context similarity score, set by the semantic scorer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f64>,
    /// The mention string this hit was retrieved for (normalized form).
    pub mapped_mention: String,
    /// Taxonomy identifier of the gene, when the index records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxonomy_id: Option<String>,
    /// Origin lexicon of the synonym, when the index records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CandidateHit {
    /// Create a new candidate hit.
    ///
    /// `mapped_mention` is the (normalized) mention string the retriever was
    /// queried with; exactness is derived from it, see
    /// [`is_exact_match`](Self::is_exact_match).
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        synonym: impl Into<String>,
        mention_score: f64,
        mapped_mention: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            synonym: synonym.into(),
            mention_score: mention_score.clamp(0.0, 1.0),
            semantic_score: None,
            mapped_mention: mapped_mention.into(),
            taxonomy_id: None,
            source: None,
        }
    }

    /// Attach a taxonomy identifier.
    #[must_use]
    pub fn with_taxonomy_id(mut self, taxonomy_id: impl Into<String>) -> Self {
        self.taxonomy_id = Some(taxonomy_id.into());
        self
    }

    /// Attach the origin lexicon name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Whether this hit matched the mention exactly: the synonym equals the
    /// mention string it was mapped to.
    #[must_use]
    pub fn is_exact_match(&self) -> bool {
        self.mapped_mention == self.synonym
    }
}

/// Sort hits descending by lexical mention score (stable).
///
/// Passed explicitly at call sites; hits carry no mutable sort mode.
pub fn sort_by_mention_score(hits: &mut [CandidateHit]) {
    hits.sort_by(|a, b| b.mention_score.total_cmp(&a.mention_score));
}

/// Sort hits descending by semantic score (stable); unscored hits sort last.
pub fn sort_by_semantic_score(hits: &mut [CandidateHit]) {
    hits.sort_by(|a, b| {
        let sa = a.semantic_score.unwrap_or(f64::NEG_INFINITY);
        let sb = b.semantic_score.unwrap_or(f64::NEG_INFINITY);
        sb.total_cmp(&sa)
    });
}
