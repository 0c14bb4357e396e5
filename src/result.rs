//! Per-mention and per-document mapping results.

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateHit;
use crate::mention::Span;

/// Whether the winning lexical match was exact or approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchType {
    /// The candidate synonym equals the normalized mention.
    Exact,
    /// Lexically close but not equal; also the default for mentions that
    /// never produced a match.
    #[default]
    Approx,
}

/// Final assignment for one mention: a winning candidate, or the rejection
/// sentinel for "no identifier assigned".
///
/// Rejection is ordinary output, distinct from an error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ResultEntry {
    /// The mention is not mapped to any identifier.
    #[default]
    Rejection,
    /// The mention is mapped to this candidate's identifier.
    Hit(CandidateHit),
}

impl ResultEntry {
    /// Whether this entry is the rejection sentinel.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, ResultEntry::Rejection)
    }

    /// The winning candidate, if any.
    #[must_use]
    pub fn hit(&self) -> Option<&CandidateHit> {
        match self {
            ResultEntry::Rejection => None,
            ResultEntry::Hit(hit) => Some(hit),
        }
    }

    /// The winning identifier, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.hit().map(|h| h.id.as_str())
    }
}

/// Working and final state of one mention's disambiguation.
///
/// Until agglomeration runs, `result_entry` is either `Rejection` or a
/// member of `filtered_candidates`. Agglomeration may afterwards substitute
/// a cluster consensus candidate drawn from a cluster mate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MappingResult {
    /// The ranked candidate list as returned by the retriever.
    pub original_candidates: Vec<CandidateHit>,
    /// Candidates surviving the candidate filter, best first.
    pub filtered_candidates: Vec<CandidateHit>,
    /// Filtered candidates reordered by semantic score, when scoring ran.
    pub semantically_ordered_candidates: Option<Vec<CandidateHit>>,
    /// The currently preferred candidate; overwritten by agglomeration when
    /// a cluster consensus is found.
    pub best_candidate: Option<CandidateHit>,
    /// The final assignment.
    pub result_entry: ResultEntry,
    /// Exact or approximate classification from the candidate filter.
    pub match_type: MatchType,
    /// Number of candidates tied at the best score after filtering.
    pub ambiguity_degree: usize,
}

impl MappingResult {
    /// Whether the mention ends up without an identifier.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.result_entry.is_rejection()
    }
}

/// One finalized mention with its location and mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionOutcome {
    /// Where the mention occurred.
    pub span: Span,
    /// Surface text of the mention.
    pub text: String,
    /// The finalized mapping state.
    pub mapping: MappingResult,
}

impl MentionOutcome {
    /// The assigned identifier, or `None` for a rejection.
    #[must_use]
    pub fn final_id(&self) -> Option<&str> {
        self.mapping.result_entry.id()
    }
}

/// All finalized mention outcomes of one document, ordered by span.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentResult {
    /// Identifier of the processed document.
    pub document_id: String,
    /// One entry per surviving mention, ordered by span.
    pub outcomes: Vec<MentionOutcome>,
}

impl DocumentResult {
    /// Count of mentions that ended in rejection.
    #[must_use]
    pub fn rejection_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.mapping.is_rejected())
            .count()
    }
}
