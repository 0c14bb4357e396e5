//! Lexical filtering of ranked candidate lists.
//!
//! The filter consumes the retriever's ranked candidates for one mention
//! and decides the match type, the surviving candidates and the ambiguity
//! degree. Exact matches, which the retriever places as a leading prefix,
//! win outright; otherwise approximate candidates pass a numeric-conflict
//! check and a best-score tie band. Numbers are load-bearing in gene
//! names ("il 2" and "il 10" are different genes), so a candidate whose
//! numeric tokens disagree with the mention's is dropped no matter how
//! well the rest of it matched.
//!
//! An empty candidate list is ordinary input: the mention keeps an empty
//! filtered list and surfaces as a rejection downstream.

use crate::candidate::CandidateHit;
use crate::mention::Mention;
use crate::normalize::numeric_tokens;
use crate::result::{MappingResult, MatchType, ResultEntry};

/// Filter a mention's ranked candidates into a [`MappingResult`].
///
/// `originals` must be sorted descending by mention score with exact
/// matches leading; the retriever guarantees this and it is not
/// re-verified here.
#[must_use]
pub fn filter_candidates(mention: &Mention, originals: Vec<CandidateHit>) -> MappingResult {
    let mut mapping = MappingResult {
        original_candidates: originals,
        ..MappingResult::default()
    };
    if mapping.original_candidates.is_empty() {
        log::debug!(
            "no candidates retrieved for mention '{}' in document {:?}",
            mention.text,
            mention.document_id
        );
        return mapping;
    }

    let exact_len = mapping
        .original_candidates
        .iter()
        .take_while(|hit| hit.is_exact_match())
        .count();

    if exact_len > 0 {
        mapping.match_type = MatchType::Exact;
        mapping.filtered_candidates = mapping.original_candidates[..exact_len].to_vec();
        mapping.ambiguity_degree = exact_len;
    } else {
        mapping.match_type = MatchType::Approx;
        mapping.filtered_candidates = approx_candidates(mention, &mapping.original_candidates);
        mapping.ambiguity_degree = mapping.filtered_candidates.len();
    }

    // The filtered list is never empty here, so the mention leaves the
    // filter with a provisional hit rather than a rejection.
    if let Some(first) = mapping.filtered_candidates.first() {
        mapping.best_candidate = Some(first.clone());
        mapping.result_entry = ResultEntry::Hit(first.clone());
    }
    mapping
}

/// Numeric-conflict filtering followed by the best-score tie band.
fn approx_candidates(mention: &Mention, originals: &[CandidateHit]) -> Vec<CandidateHit> {
    let mention_numbers = numeric_tokens(&mention.normalized_text);
    let mut kept: Vec<CandidateHit> = originals
        .iter()
        .filter(|hit| {
            let numbers = numeric_tokens(&hit.synonym);
            numbers.is_empty() || numbers == mention_numbers
        })
        .cloned()
        .collect();

    // Numeric filtering alone never rejects a mention outright.
    if kept.is_empty() {
        log::debug!(
            "numeric conflicts removed every candidate for '{}'; keeping top original",
            mention.text
        );
        return vec![originals[0].clone()];
    }

    let best = kept[0].mention_score;
    let band = kept
        .iter()
        .take_while(|hit| hit.mention_score == best)
        .count();
    if band == 0 {
        return vec![originals[0].clone()];
    }
    kept.truncate(band);
    kept
}
