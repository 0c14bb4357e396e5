//! Token helpers and droppability checks over normalized mention text.
//!
//! Mentions arrive already normalized by the host (lowercased, punctuation
//! split). The checks here decide whether a normalized term is too generic
//! to denote a particular gene: a bare "protein", a trailing "gene product",
//! a family or domain name. Such mentions are dropped before candidate
//! retrieval.

use std::borrow::Cow;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Trailing nondescriptive noun, anchored at the term start or after
/// whitespace so that "brca1 gene" strips to "brca1" while "gene product"
/// strips away entirely.
static RE_NONDESC_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:^|\s)(?:promoter|onco protein|oncoprotein|proto oncogene|protooncogene|protease|binding site|transcript|element|construct|si rna|prem rna|pre m rna|m rna ?s?|rna|locus|gene product|reporter gene|reporter|gene|protein|product|c dna|molecule|pseudogene|autoantigen|peptide|polypeptide|enzyme)$",
    )
    .expect("invalid nondescriptive pattern")
});

/// Terms naming a protein domain, family, or other group rather than a
/// gene. A term ending in one of these denotes no single identifier.
static RE_DOMAIN_FAMILY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^.*(?:acceptors|acid|activators|adapters|adaptors|antibodi|antibody|binders|binding site|binding|box|channel|chromosome|coactivators|cofactors|complex|domain|dyneins|effectors|element|enhancers|epitope|exchangers|exon|facilitators|factors|familie|family|filament|finger|helicases|histone|homeodomain|inducers|inhibitors|integrators|interactors|intron|kinases|kinesins|lectins|ligands|mediators|member|membrane|modifiers|modulators|motif|myosins|proactivators|proteases|proteasome|proteins|reductases|region|regulators|repeat|repressors|residue|responders|sequence|site|subdomain|subfamily|subunits|superfamily|suppressors|syndrome|tail|terminal|terminators|terminus|transporters|transferases|zinc finger)(?:e|s|es)?$",
    )
    .expect("invalid domain/family pattern")
});

/// A whole term that names proteins in general rather than a specific gene,
/// with an optional plural suffix.
static RE_UNSPECIFIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:protein|gene|receptor|antigen|enzyme|factor|molecule|peptide|polypeptide|antibody|hormone|cytokine|chemokine|transcript|product|subunit|ligand|kinase|channel|interleukin|growth factor|transcription factor)(?:e|s|es)?$",
    )
    .expect("invalid unspecified pattern")
});

static RE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("invalid numeric pattern"));

/// Multiset of purely-numeric whitespace tokens, e.g. `"il 2"` yields
/// `{"2": 1}`. Numbers carry gene-name identity ("il 2" vs "il 10"), so the
/// candidate filter compares these multisets between mention and synonym.
#[must_use]
pub fn numeric_tokens(text: &str) -> HashMap<&str, usize> {
    let mut numbers = HashMap::new();
    for token in text.split_whitespace() {
        if RE_NUMERIC.is_match(token) {
            *numbers.entry(token).or_insert(0) += 1;
        }
    }
    numbers
}

fn strip_nondescriptive_tail(term: &str) -> Cow<'_, str> {
    RE_NONDESC_TAIL.replace(term, "")
}

fn strip_unspecified(term: &str) -> Cow<'_, str> {
    RE_UNSPECIFIED.replace(term, "")
}

/// What is left of a stripped term when it no longer names anything: the
/// empty string, or a dangling plural "s".
fn is_residue(term: &str) -> bool {
    term.is_empty() || term == "s"
}

/// Whether a normalized term names no particular gene: a domain or family
/// term, or a bare unspecified noun ("protein", "receptors", ...).
#[must_use]
pub fn is_unspecified(normalized: &str) -> bool {
    let trimmed = normalized.trim();
    if is_residue(trimmed) {
        return true;
    }
    if RE_DOMAIN_FAMILY.is_match(trimmed) {
        return true;
    }
    let stripped = strip_nondescriptive_tail(trimmed);
    let stripped = strip_unspecified(stripped.trim());
    is_residue(stripped.trim())
}

/// Whether a normalized term consists only of nondescriptive nouns, e.g.
/// "gene product" or "protein", ignoring domain/family terms.
#[must_use]
pub fn is_nondescriptive(normalized: &str) -> bool {
    let trimmed = normalized.trim();
    if is_residue(trimmed) {
        return true;
    }
    let stripped = strip_nondescriptive_tail(trimmed);
    let stripped = strip_unspecified(stripped.trim());
    is_residue(stripped.trim())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn numeric_token_counts_never_exceed_token_count(text in "[a-z0-9 ]{0,40}") {
            let tokens = text.split_whitespace().count();
            let numbers: usize = numeric_tokens(&text).values().sum();
            prop_assert!(numbers <= tokens);
        }

        #[test]
        fn purely_numeric_strings_yield_themselves(n in 0u32..100_000) {
            let text = n.to_string();
            let numbers = numeric_tokens(&text);
            prop_assert_eq!(numbers.get(text.as_str()), Some(&1));
        }
    }
}
