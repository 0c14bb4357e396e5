//! Document model: spans, mentions, acronym definitions, and name-level
//! unification of overlapping mentions.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Half-open byte span `[begin, end)` into a document's text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub begin: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    /// Whether the span covers no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    /// Whether two spans share at least one byte. Spans covering the same
    /// range overlap; merely adjacent spans do not.
    #[must_use]
    pub fn overlaps(&self, other: Span) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// Slice `text` at this span, or `None` when the span is reversed, out
    /// of bounds, or not on a character boundary.
    #[must_use]
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.begin > self.end || self.end > text.len() {
            return None;
        }
        if !text.is_char_boundary(self.begin) || !text.is_char_boundary(self.end) {
            return None;
        }
        Some(&text[self.begin..self.end])
    }
}

/// Which upstream component produced a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tagger {
    /// A trained sequence tagger.
    Ner,
    /// A dictionary/gazetteer matcher.
    Gazetteer,
}

/// A gene mention located in a document by the upstream tagging pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    /// Surface text of the mention.
    pub text: String,
    /// Normalized form used for candidate retrieval and filtering. Hosts
    /// supply their own normalization; defaults to the lowercased surface.
    pub normalized_text: String,
    /// Identifier of the containing document.
    pub document_id: String,
    /// Location in the document text.
    pub span: Span,
    /// Origin tagger, when known.
    pub tagger: Option<Tagger>,
    /// Free text surrounding the mention, compared against candidate
    /// background contexts by the semantic scorer.
    pub document_context: String,
}

impl Mention {
    /// Create a mention from its surface text and location.
    #[must_use]
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        let text = text.into();
        let normalized_text = text.to_lowercase();
        Self {
            text,
            normalized_text,
            document_id: String::new(),
            span,
            tagger: None,
            document_context: String::new(),
        }
    }

    /// Override the normalized form.
    #[must_use]
    pub fn with_normalized_text(mut self, normalized: impl Into<String>) -> Self {
        self.normalized_text = normalized.into();
        self
    }

    /// Set the containing document's identifier.
    #[must_use]
    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = document_id.into();
        self
    }

    /// Set the origin tagger.
    #[must_use]
    pub fn with_tagger(mut self, tagger: Tagger) -> Self {
        self.tagger = Some(tagger);
        self
    }

    /// Set the surrounding document context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.document_context = context.into();
        self
    }
}

/// An acronym and its long form, both located in the document by an
/// upstream abbreviation detector. Text fields may be absent; they are then
/// resolved from the spans, see [`Document::acronym_pair`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcronymDefinition {
    /// Short form text, when the detector recorded it.
    pub acronym_text: Option<String>,
    /// Location of the short form.
    pub acronym_span: Span,
    /// Long form text, when the detector recorded it.
    pub longform_text: Option<String>,
    /// Location of the long form.
    pub longform_span: Span,
}

impl AcronymDefinition {
    /// Create a definition from the two spans.
    #[must_use]
    pub fn new(acronym_span: Span, longform_span: Span) -> Self {
        Self {
            acronym_text: None,
            acronym_span,
            longform_text: None,
            longform_span,
        }
    }

    /// Set the short form text explicitly.
    #[must_use]
    pub fn with_acronym_text(mut self, text: impl Into<String>) -> Self {
        self.acronym_text = Some(text.into());
        self
    }

    /// Set the long form text explicitly.
    #[must_use]
    pub fn with_longform_text(mut self, text: impl Into<String>) -> Self {
        self.longform_text = Some(text.into());
        self
    }
}

/// A document with its mentions and acronym definitions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier, also the key of the per-document score cache.
    pub id: String,
    /// Full document text; acronym spans index into it.
    pub text: String,
    /// Mentions found by the upstream taggers.
    pub mentions: Vec<Mention>,
    /// Acronym definitions found by the upstream detector.
    pub acronyms: Vec<AcronymDefinition>,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            mentions: Vec::new(),
            acronyms: Vec::new(),
        }
    }

    /// Add a mention.
    #[must_use]
    pub fn with_mention(mut self, mention: Mention) -> Self {
        self.mentions.push(mention);
        self
    }

    /// Add an acronym definition.
    #[must_use]
    pub fn with_acronym(mut self, definition: AcronymDefinition) -> Self {
        self.acronyms.push(definition);
        self
    }

    /// Resolve a definition to its `(acronym, longform)` text pair.
    ///
    /// Missing text fields are sliced out of the document at the recorded
    /// spans and trimmed. Returns `None`, with a warning, when a span does
    /// not fall inside the document text; such definitions are skipped
    /// rather than failing the document.
    #[must_use]
    pub fn acronym_pair(&self, definition: &AcronymDefinition) -> Option<(String, String)> {
        let acronym = self.resolve_text(
            definition.acronym_text.as_deref(),
            definition.acronym_span,
            "acronym",
        )?;
        let longform = self.resolve_text(
            definition.longform_text.as_deref(),
            definition.longform_span,
            "longform",
        )?;
        Some((acronym, longform))
    }

    fn resolve_text(&self, explicit: Option<&str>, span: Span, role: &str) -> Option<String> {
        if let Some(text) = explicit {
            return Some(text.trim().to_string());
        }
        match span.slice(&self.text) {
            Some(sliced) => Some(sliced.trim().to_string()),
            None => {
                warn!(
                    "document {}: {} span {}..{} outside document text, skipping definition",
                    self.id, role, span.begin, span.end
                );
                None
            }
        }
    }

    /// Collapse overlapping mentions in place, applying each strategy in
    /// order. See [`unify_overlapping`].
    pub fn unify_mentions(&mut self, strategies: &[UnificationStrategy]) {
        self.mentions = unify_overlapping(std::mem::take(&mut self.mentions), strategies);
    }
}

/// How to pick the surviving mention when two mentions overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnificationStrategy {
    /// Keep the mention produced by the given tagger.
    PrioritizeTagger(Tagger),
    /// Keep the mention with the longer surface text.
    LongerFirst,
}

impl UnificationStrategy {
    /// Whether `challenger` should replace the already-kept `incumbent`.
    fn prefers(&self, challenger: &Mention, incumbent: &Mention) -> bool {
        match self {
            UnificationStrategy::PrioritizeTagger(tagger) => challenger.tagger == Some(*tagger),
            UnificationStrategy::LongerFirst => challenger.text.len() > incumbent.text.len(),
        }
    }
}

/// Collapse overlapping mentions, applying each strategy in order over the
/// whole set. The result is sorted by span and contains no two overlapping
/// mentions.
#[must_use]
pub fn unify_overlapping(
    mut mentions: Vec<Mention>,
    strategies: &[UnificationStrategy],
) -> Vec<Mention> {
    mentions.sort_by_key(|m| m.span);
    for strategy in strategies {
        mentions = unify_pass(mentions, *strategy);
    }
    mentions
}

fn unify_pass(mentions: Vec<Mention>, strategy: UnificationStrategy) -> Vec<Mention> {
    let mut kept: Vec<Mention> = Vec::with_capacity(mentions.len());
    for mention in mentions {
        // Input is span-sorted and `kept` stays non-overlapping, so the only
        // kept mention that can overlap the next one is the last.
        match kept.last_mut() {
            Some(last) if last.span.overlaps(mention.span) => {
                if strategy.prefers(&mention, last) {
                    debug!(
                        "unification: '{}' at {}..{} replaces '{}' at {}..{}",
                        mention.text,
                        mention.span.begin,
                        mention.span.end,
                        last.text,
                        last.span.begin,
                        last.span.end
                    );
                    *last = mention;
                }
            }
            _ => kept.push(mention),
        }
    }
    kept
}
