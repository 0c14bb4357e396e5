//! # genemap
//!
//! Gene-mention disambiguation for biomedical text.
//!
//! Given mentions located by upstream taggers and ranked lexical
//! candidates from a search index, the pipeline decides whether each
//! mention denotes a known gene and which identifier it denotes, keeping
//! mentions of the same gene consistent across a document.
//!
//! - **Filtering**: exact-prefix classification, numeric-conflict removal, best-score banding
//! - **Semantic re-ranking**: document context against indexed gene descriptions, cached process-wide
//! - **Gating**: optional trained accept/reject models per match type
//! - **Agglomeration**: acronym/long-form coreference clusters with geometric-mean consensus, or id-overlap clustering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use genemap::prelude::*;
//!
//! let pipeline = Pipeline::builder()
//!     .with_candidate_source(Arc::new(my_search_index))
//!     .with_context_index("entrez-2024", Arc::new(my_context_index))
//!     .with_similarity(Arc::new(my_similarity))
//!     .build()?;
//!
//! let mut document = Document::new("pmid-1", text);
//! // ... attach mentions and acronym definitions found upstream ...
//! let result = pipeline.map_document(&mut document)?;
//! for outcome in &result.outcomes {
//!     println!("{} -> {:?}", outcome.text, outcome.final_id());
//! }
//! ```
//!
//! ## Pipeline Stages
//!
//! | Stage | Decides |
//! |-------|---------|
//! | Unification | which of two overlapping mentions survives |
//! | Unspecified drop | whether the term can denote a particular gene at all |
//! | Candidate filter | exact vs. approximate, numeric conflicts, tie band |
//! | Semantic scorer | context similarity per candidate, batched and cached |
//! | Learned gate | optional trained veto on mention and best candidate |
//! | Agglomerator | coreference clusters and one consensus id per cluster |
//!
//! ## Feature Flags
//!
//! ```toml
//! [dependencies]
//! genemap = "0.1"                                         # std mutexes
//! genemap = { version = "0.1", features = ["fast-lock"] } # parking_lot mutexes
//! ```
//!
//! ## Filtering Without a Pipeline
//!
//! The candidate filter is a pure function and works on its own:
//!
//! ```rust
//! use genemap::{filter_candidates, CandidateHit, Mention, Span};
//!
//! let mention = Mention::new("BRCA1", Span::new(0, 5));
//! let candidates = vec![
//!     CandidateHit::new("672", "brca1", 1.0, "brca1"),
//!     CandidateHit::new("675", "brca2", 0.4, "brca1"),
//! ];
//! let mapping = filter_candidates(&mention, candidates);
//! assert_eq!(mapping.result_entry.id(), Some("672"));
//! ```
//!
//! ## Design
//!
//! - **Rejection is output**: a mention that resolves to nothing yields the rejection sentinel, never an error
//! - **Collaborators are traits**: retrieval, context lookup, similarity and gate features are injected
//! - **One document at a time**: pipelines share caches, never in-flight state
//! - **Explicit sorts**: candidate ordering is chosen at each call site, not stored on the value

#![warn(missing_docs)]

pub mod agglomerate;
mod candidate;
pub mod context;
mod error;
pub mod filter;
pub mod gate;
mod mention;
pub mod normalize;
pub mod pipeline;
mod result;
pub mod semantic;
pub mod sources;
pub mod sync;

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    //!
    //! ```rust
    //! use genemap::prelude::*;
    //!
    //! let mention = Mention::new("BRCA1", Span::new(0, 5));
    //! let mapping = filter_candidates(
    //!     &mention,
    //!     vec![CandidateHit::new("672", "brca1", 1.0, "brca1")],
    //! );
    //! assert_eq!(mapping.result_entry.id(), Some("672"));
    //! ```
    pub use crate::agglomerate::{
        AgglomerationCandidates, AgglomerationStrategy, Agglomerator, MentionCluster,
    };
    pub use crate::candidate::CandidateHit;
    pub use crate::context::ContextCacheRegistry;
    pub use crate::error::{Error, Result};
    pub use crate::filter::filter_candidates;
    pub use crate::gate::{GateArm, GateConfig, LearnedGate, LinearModel};
    pub use crate::mention::{
        AcronymDefinition, Document, Mention, Span, Tagger, UnificationStrategy,
    };
    pub use crate::pipeline::Pipeline;
    pub use crate::result::{
        DocumentResult, MappingResult, MatchType, MentionOutcome, ResultEntry,
    };
    pub use crate::sources::{
        CandidateSource, ContextIndex, ContextSimilarity, StaticCandidateSource,
        StaticContextIndex,
    };
}

// Re-exports
pub use agglomerate::{
    AgglomerationCandidates, AgglomerationStrategy, Agglomerator, MentionCluster,
};
pub use candidate::{sort_by_mention_score, sort_by_semantic_score, CandidateHit};
pub use context::{ContextCache, ContextCacheRegistry, ScoreCache};
pub use error::{Error, Result};
pub use filter::filter_candidates;
pub use gate::{
    GateArm, GateArmConfig, GateConfig, GateDecision, GateFeatures, GateModel, LearnedGate,
    LinearModel,
};
pub use mention::{
    unify_overlapping, AcronymDefinition, Document, Mention, Span, Tagger, UnificationStrategy,
};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use result::{DocumentResult, MappingResult, MatchType, MentionOutcome, ResultEntry};
pub use semantic::SemanticScorer;
pub use sources::{
    CandidateSource, ContextIndex, ContextSimilarity, StaticCandidateSource, StaticContextIndex,
};
