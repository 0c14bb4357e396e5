//! End-to-end pipeline scenarios: retrieval through filtering, scoring,
//! gating and agglomeration to final per-mention identifiers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use genemap::prelude::*;
use genemap::{GateFeatures, Result as GenemapResult};

/// Context index wrapper counting batched lookups.
struct CountingIndex {
    inner: StaticContextIndex,
    calls: AtomicUsize,
}

impl ContextIndex for CountingIndex {
    fn batch_contexts(&self, ids: &[String]) -> GenemapResult<HashMap<String, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.batch_contexts(ids)
    }
}

/// Similarity by shared whitespace tokens, counting invocations.
struct TokenOverlap {
    calls: AtomicUsize,
}

impl ContextSimilarity for TokenOverlap {
    fn similarity(&self, document_context: &str, candidate_context: &str) -> f64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let document: HashSet<&str> = document_context.split_whitespace().collect();
        candidate_context
            .split_whitespace()
            .filter(|token| document.contains(token))
            .count() as f64
    }
}

fn counting_pipeline(
    source: StaticCandidateSource,
    index: StaticContextIndex,
) -> (Pipeline, Arc<CountingIndex>, Arc<TokenOverlap>) {
    let index = Arc::new(CountingIndex {
        inner: index,
        calls: AtomicUsize::new(0),
    });
    let similarity = Arc::new(TokenOverlap {
        calls: AtomicUsize::new(0),
    });
    let pipeline = Pipeline::builder()
        .with_candidate_source(Arc::new(source))
        .with_context_index("test-index", index.clone())
        .with_similarity(similarity.clone())
        .build()
        .unwrap();
    (pipeline, index, similarity)
}

fn exact(id: &str, synonym: &str, score: f64) -> CandidateHit {
    CandidateHit::new(id, synonym, score, synonym)
}

#[test]
fn exact_mention_resolves_and_generic_terms_drop_out() {
    let source = StaticCandidateSource::new().with_candidates(
        "brca1",
        vec![
            exact("672", "brca1", 1.0),
            CandidateHit::new("675", "brca2", 0.4, "brca1"),
        ],
    );
    let (pipeline, _, _) = counting_pipeline(source, StaticContextIndex::new());

    let mut document = Document::new("pmid-1", "the protein BRCA1 is mutated")
        .with_mention(Mention::new("protein", Span::new(4, 11)))
        .with_mention(Mention::new("BRCA1", Span::new(12, 17)));

    let result = pipeline.map_document(&mut document).unwrap();

    assert_eq!(result.outcomes.len(), 1);
    let outcome = &result.outcomes[0];
    assert_eq!(outcome.text, "BRCA1");
    assert_eq!(outcome.final_id(), Some("672"));
    assert_eq!(outcome.mapping.match_type, MatchType::Exact);
    assert_eq!(outcome.mapping.ambiguity_degree, 1);
    assert_eq!(outcome.mapping.filtered_candidates.len(), 1);
}

#[test]
fn numeric_conflict_picks_the_right_interleukin() {
    let source = StaticCandidateSource::new().with_candidates(
        "il 2",
        vec![
            CandidateHit::new("16183", "il 10", 0.9, "il-2"),
            CandidateHit::new("3558", "il 2", 0.85, "il-2"),
        ],
    );
    let (pipeline, _, _) = counting_pipeline(source, StaticContextIndex::new());

    let mut document = Document::new("pmid-2", "IL2 production")
        .with_mention(Mention::new("IL2", Span::new(0, 3)).with_normalized_text("il 2"));

    let result = pipeline.map_document(&mut document).unwrap();

    let outcome = &result.outcomes[0];
    assert_eq!(outcome.final_id(), Some("3558"));
    assert_eq!(outcome.mapping.match_type, MatchType::Approx);
    assert_eq!(outcome.mapping.ambiguity_degree, 1);
}

#[test]
fn tied_candidates_resolve_by_document_context() {
    let source = StaticCandidateSource::new().with_candidates(
        "abc",
        vec![
            CandidateHit::new("111", "alpha one", 0.9, "abc"),
            CandidateHit::new("222", "alpha two", 0.9, "abc"),
        ],
    );
    let index = StaticContextIndex::new()
        .with_context("111", "liver enzyme pathway")
        .with_context("222", "t cell cytokine");
    let (pipeline, _, _) = counting_pipeline(source, index);

    let mut document = Document::new("pmid-9", "ABC signaling").with_mention(
        Mention::new("ABC", Span::new(0, 3)).with_context("t cell cytokine signaling"),
    );

    let result = pipeline.map_document(&mut document).unwrap();

    let outcome = &result.outcomes[0];
    assert_eq!(outcome.mapping.ambiguity_degree, 2);
    let ordered = outcome
        .mapping
        .semantically_ordered_candidates
        .as_ref()
        .unwrap();
    assert_eq!(ordered[0].id, "222");
    // the pick follows the semantic ordering, not the retrieval order
    assert_eq!(outcome.final_id(), Some("222"));
    let best = outcome.mapping.best_candidate.as_ref().unwrap();
    assert_eq!(best.semantic_score, Some(3.0));
}

#[test]
fn unknown_mentions_reject_without_failing_the_document() {
    let source = StaticCandidateSource::new()
        .with_candidates("brca1", vec![exact("672", "brca1", 1.0)]);
    let (pipeline, _, _) = counting_pipeline(source, StaticContextIndex::new());

    let mut document = Document::new("pmid-3", "BRCA1 and XYZZY")
        .with_mention(Mention::new("BRCA1", Span::new(0, 5)))
        .with_mention(Mention::new("XYZZY", Span::new(10, 15)));

    let result = pipeline.map_document(&mut document).unwrap();

    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.rejection_count(), 1);
    assert_eq!(result.outcomes[0].final_id(), Some("672"));
    assert_eq!(result.outcomes[1].final_id(), None);
    assert!(result.outcomes[1].mapping.is_rejected());
}

#[test]
fn acronym_and_longform_agree_on_one_identifier() {
    let text = "Interleukin 2 (IL-2) activates T cells. IL-2 binds its receptor.";
    let source = StaticCandidateSource::new()
        .with_candidates(
            "interleukin 2",
            vec![exact("3558", "interleukin 2", 0.95)],
        )
        .with_candidates(
            "il-2",
            vec![CandidateHit::new("3558", "il 2", 0.9, "il-2")],
        );
    let index = StaticContextIndex::new().with_context("3558", "t cell growth factor");
    let (pipeline, _, _) = counting_pipeline(source, index);

    let mut document = Document::new("pmid-4", text)
        .with_mention(
            Mention::new("Interleukin 2", Span::new(0, 13)).with_context("t cell growth"),
        )
        .with_mention(Mention::new("IL-2", Span::new(40, 44)).with_context("t cell growth"))
        .with_acronym(AcronymDefinition::new(Span::new(15, 19), Span::new(0, 13)));

    let result = pipeline.map_document(&mut document).unwrap();

    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.outcomes[0].final_id(), Some("3558"));
    assert_eq!(result.outcomes[1].final_id(), Some("3558"));
    assert_eq!(result.outcomes[0].mapping.match_type, MatchType::Exact);
    assert_eq!(result.outcomes[1].mapping.match_type, MatchType::Approx);
}

#[test]
fn semantic_scores_are_computed_once_per_document() {
    let source = StaticCandidateSource::new()
        .with_candidates("brca1", vec![exact("672", "brca1", 1.0)]);
    let index = StaticContextIndex::new().with_context("672", "breast cancer");
    let (pipeline, index, similarity) = counting_pipeline(source, index);

    let mut document = Document::new("pmid-5", "BRCA1 ... BRCA1 again")
        .with_mention(Mention::new("BRCA1", Span::new(0, 5)).with_context("breast cancer"))
        .with_mention(Mention::new("BRCA1", Span::new(10, 15)).with_context("breast cancer"));

    let result = pipeline.map_document(&mut document).unwrap();

    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(similarity.calls.load(Ordering::SeqCst), 1);
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    for outcome in &result.outcomes {
        let best = outcome.mapping.best_candidate.as_ref().unwrap();
        assert_eq!(best.semantic_score, Some(2.0));
    }

    // a second document reuses the cached context but not the scores
    let mut next = Document::new("pmid-6", "BRCA1")
        .with_mention(Mention::new("BRCA1", Span::new(0, 5)).with_context("breast cancer"));
    pipeline.map_document(&mut next).unwrap();

    assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    assert_eq!(similarity.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn pipelines_share_contexts_through_a_registry() {
    let registry = ContextCacheRegistry::new();
    let index = Arc::new(CountingIndex {
        inner: StaticContextIndex::new().with_context("672", "breast cancer"),
        calls: AtomicUsize::new(0),
    });

    let build = |registry: &ContextCacheRegistry| {
        Pipeline::builder()
            .with_candidate_source(Arc::new(
                StaticCandidateSource::new()
                    .with_candidates("brca1", vec![exact("672", "brca1", 1.0)]),
            ))
            .with_context_index("shared-index", index.clone())
            .with_similarity(Arc::new(TokenOverlap {
                calls: AtomicUsize::new(0),
            }))
            .with_registry(registry.clone())
            .build()
            .unwrap()
    };
    let first = build(&registry);
    let second = build(&registry);

    let mut one = Document::new("pmid-7", "BRCA1")
        .with_mention(Mention::new("BRCA1", Span::new(0, 5)).with_context("breast cancer"));
    first.map_document(&mut one).unwrap();
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);

    let mut two = Document::new("pmid-8", "BRCA1")
        .with_mention(Mention::new("BRCA1", Span::new(0, 5)).with_context("breast cancer"));
    second.map_document(&mut two).unwrap();

    // the second pipeline found the context already cached
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn id_overlap_strategy_resolves_ambiguous_mentions() {
    let source = StaticCandidateSource::new()
        .with_candidates("alpha", vec![CandidateHit::new("100", "syn a", 0.9, "alpha")])
        .with_candidates("beta", vec![CandidateHit::new("300", "syn c", 0.85, "beta")])
        .with_candidates(
            "gamma",
            vec![
                CandidateHit::new("100", "syn a", 0.7, "gamma"),
                CandidateHit::new("300", "syn c", 0.7, "gamma"),
            ],
        );
    let similarity = Arc::new(TokenOverlap {
        calls: AtomicUsize::new(0),
    });
    let pipeline = Pipeline::builder()
        .with_candidate_source(Arc::new(source))
        .with_context_index("test-index", Arc::new(StaticContextIndex::new()))
        .with_similarity(similarity)
        .with_agglomerator(Agglomerator::new().with_strategy(AgglomerationStrategy::IdOverlap))
        .build()
        .unwrap();

    let mut document = Document::new("pmid-9", "alpha beta gamma")
        .with_mention(Mention::new("alpha", Span::new(0, 5)))
        .with_mention(Mention::new("beta", Span::new(6, 10)))
        .with_mention(Mention::new("gamma", Span::new(11, 16)));

    let result = pipeline.map_document(&mut document).unwrap();

    assert_eq!(result.outcomes[0].final_id(), Some("100"));
    assert_eq!(result.outcomes[1].final_id(), Some("300"));
    // the ambiguous mention resolves to the top of the unioned tie, not both
    assert_eq!(result.outcomes[2].final_id(), Some("100"));
}

// ==================== gate scenarios ====================

struct PlainFeatures;

impl GateFeatures for PlainFeatures {
    fn mention_features(&self, _mention: &Mention, ranked: &[CandidateHit]) -> Vec<f64> {
        vec![ranked.len() as f64]
    }

    fn candidate_features(&self, _mention: &Mention, candidate: &CandidateHit) -> Vec<f64> {
        vec![candidate.mention_score]
    }
}

fn gate_from_files(threshold: f64) -> LearnedGate {
    let dir = tempfile::tempdir().unwrap();
    let mention_path = dir.path().join("mention.json");
    let candidate_path = dir.path().join("candidate.json");
    std::fs::write(&mention_path, r#"{"weights": [0.0], "bias": 1.0}"#).unwrap();
    std::fs::write(&candidate_path, r#"{"weights": [1.0]}"#).unwrap();

    let mention_model = Arc::new(LinearModel::from_json_file(&mention_path).unwrap());
    let candidate_model = Arc::new(LinearModel::from_json_file(&candidate_path).unwrap());
    LearnedGate::new(Arc::new(PlainFeatures))
        .with_exact_arm(
            GateArm::new()
                .with_mention_model(mention_model.clone())
                .with_candidate_model(candidate_model.clone())
                .with_semantic_threshold(threshold),
        )
        .with_approx_arm(
            GateArm::new()
                .with_mention_model(mention_model)
                .with_candidate_model(candidate_model)
                .with_semantic_threshold(threshold),
        )
}

#[test]
fn gate_threshold_rejects_semantically_weak_mentions() {
    let source = StaticCandidateSource::new()
        .with_candidates("brca1", vec![exact("672", "brca1", 1.0)])
        .with_candidates("tp53", vec![exact("7157", "tp53", 1.0)]);
    let index = StaticContextIndex::new()
        .with_context("672", "breast cancer gene")
        .with_context("7157", "tumor suppressor");

    let similarity = Arc::new(TokenOverlap {
        calls: AtomicUsize::new(0),
    });
    let pipeline = Pipeline::builder()
        .with_candidate_source(Arc::new(source))
        .with_context_index("test-index", Arc::new(CountingIndex {
            inner: index,
            calls: AtomicUsize::new(0),
        }))
        .with_similarity(similarity)
        .with_gate(gate_from_files(0.5))
        .build()
        .unwrap();

    let mut document = Document::new("pmid-10", "BRCA1 and TP53")
        .with_mention(Mention::new("BRCA1", Span::new(0, 5)).with_context("breast cancer risk"))
        .with_mention(Mention::new("TP53", Span::new(10, 14)).with_context("breast cancer risk"));

    let result = pipeline.map_document(&mut document).unwrap();

    // BRCA1's context overlaps the document; TP53's does not
    assert_eq!(result.rejection_count(), 1);
    assert_eq!(result.outcomes[0].final_id(), Some("672"));
    assert_eq!(result.outcomes[1].final_id(), None);
}

#[test]
fn mention_level_veto_rejects_everything() {
    let veto = Arc::new(LinearModel::new(Vec::new(), -1.0));
    let gate = LearnedGate::new(Arc::new(PlainFeatures))
        .with_exact_arm(GateArm::new().with_mention_model(veto.clone()))
        .with_approx_arm(GateArm::new().with_mention_model(veto));

    let source = StaticCandidateSource::new()
        .with_candidates("brca1", vec![exact("672", "brca1", 1.0)]);
    let pipeline = Pipeline::builder()
        .with_candidate_source(Arc::new(source))
        .with_context_index("test-index", Arc::new(StaticContextIndex::new()))
        .with_similarity(Arc::new(TokenOverlap {
            calls: AtomicUsize::new(0),
        }))
        .with_gate(gate)
        .build()
        .unwrap();

    let mut document = Document::new("pmid-11", "BRCA1")
        .with_mention(Mention::new("BRCA1", Span::new(0, 5)));

    let result = pipeline.map_document(&mut document).unwrap();
    assert_eq!(result.rejection_count(), 1);
}

#[test]
fn malformed_model_files_fail_loading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "not json at all").unwrap();

    let err = LinearModel::from_json_file(&path).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}
