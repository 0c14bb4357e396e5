//! Coreference agglomeration of mapped mentions.
//!
//! After every mention of a document has been filtered and scored on its
//! own, the agglomerator groups mentions that denote the same gene into
//! [`MentionCluster`]s and picks one consensus identifier per cluster, so
//! that an acronym, its long form and every mention matched to either
//! leave the pipeline with the same id.
//!
//! Two strategies exist. [`AgglomerationStrategy::Acronym`] keys clusters
//! by acronym/long-form pairs found in the document, falling back to the
//! best candidate's mapped mention text; consensus within a cluster is
//! decided by geometric-mean scoring over the members' candidate lists.
//! [`AgglomerationStrategy::IdOverlap`] instead merges mentions whose
//! candidate identifier sets intersect, pulling mentions that would land
//! in several clusters out into singleton clusters of their own.
//!
//! Acronym clustering is a single pass keyed by text identity: two
//! clusters under different long forms never merge, even when they turn
//! out to share a best candidate id. Callers needing that stronger
//! guarantee should use the id-overlap strategy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::candidate::{self, CandidateHit};
use crate::mention::Document;
use crate::result::{MappingResult, ResultEntry};

/// Upper bound on candidates scanned per mention during agglomeration.
pub const DEFAULT_MAX_CANDIDATES: usize = 20;

/// A group of mentions believed to denote one gene.
///
/// `members` are indices into the document's mention and mapping lists,
/// which stay parallel throughout the pipeline.
#[derive(Debug, Clone, Default)]
pub struct MentionCluster {
    /// Indices of the member mentions.
    pub members: Vec<usize>,
    /// The identifier the cluster agreed on, when one exists.
    pub consensus: Option<CandidateHit>,
}

/// How mentions are grouped into clusters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgglomerationStrategy {
    /// Cluster by acronym/long-form text identity.
    #[default]
    Acronym,
    /// Cluster by overlapping candidate identifier sets.
    IdOverlap,
}

/// Which candidate list of a mention feeds the agglomerator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgglomerationCandidates {
    /// The filtered list; falls back to originals when empty.
    #[default]
    Filtered,
    /// The unfiltered retriever list.
    Original,
    /// The semantically reordered list; falls back to originals when
    /// absent.
    Semantic,
}

/// Groups a document's mapped mentions into consensus clusters.
#[derive(Debug, Clone)]
pub struct Agglomerator {
    strategy: AgglomerationStrategy,
    candidates: AgglomerationCandidates,
    max_candidates: usize,
}

impl Default for Agglomerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Agglomerator {
    /// Create an agglomerator with the acronym strategy, the filtered
    /// candidate list and the default scan bound.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategy: AgglomerationStrategy::default(),
            candidates: AgglomerationCandidates::default(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    /// Select the clustering strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: AgglomerationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Select which candidate list of each mention is scanned.
    #[must_use]
    pub fn with_candidate_list(mut self, candidates: AgglomerationCandidates) -> Self {
        self.candidates = candidates;
        self
    }

    /// Bound the number of candidates scanned per mention.
    #[must_use]
    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    /// Cluster the document's mentions and overwrite each member's best
    /// candidate with its cluster's consensus.
    ///
    /// `mappings` runs parallel to `document.mentions`. Rejected mentions
    /// join no cluster and keep their rejection.
    pub fn agglomerate(
        &self,
        document: &Document,
        mappings: &mut [MappingResult],
    ) -> Vec<MentionCluster> {
        let clusters = match self.strategy {
            AgglomerationStrategy::Acronym => self.acronym_clusters(document, mappings),
            AgglomerationStrategy::IdOverlap => self.id_clusters(mappings),
        };
        log::debug!(
            "agglomerated {} mentions of document {} into {} clusters",
            mappings.len(),
            document.id,
            clusters.len()
        );
        clusters
    }

    fn candidate_list<'a>(&self, mapping: &'a MappingResult) -> &'a [CandidateHit] {
        match self.candidates {
            AgglomerationCandidates::Filtered => {
                if mapping.filtered_candidates.is_empty() {
                    &mapping.original_candidates
                } else {
                    &mapping.filtered_candidates
                }
            }
            AgglomerationCandidates::Original => &mapping.original_candidates,
            AgglomerationCandidates::Semantic => mapping
                .semantically_ordered_candidates
                .as_deref()
                .unwrap_or(&mapping.original_candidates),
        }
    }

    // ==================== acronym strategy ====================

    fn acronym_clusters(
        &self,
        document: &Document,
        mappings: &mut [MappingResult],
    ) -> Vec<MentionCluster> {
        let pairs: Vec<(String, String)> = document
            .acronyms
            .iter()
            .filter_map(|definition| document.acronym_pair(definition))
            .collect();

        // One table keyed by long form (acronym matches) or by the
        // mention's own mapped text (fallback), so both routes can land
        // in the same cluster.
        let mut table: BTreeMap<String, MentionCluster> = BTreeMap::new();
        for index in 0..mappings.len() {
            let (matched, own_best) = {
                let mapping = &mappings[index];
                if mapping.is_rejected() {
                    continue;
                }
                let Some(best) = mapping.best_candidate.as_ref() else {
                    continue;
                };
                (self.best_pair_match(mapping, &pairs), best.clone())
            };

            let (key, hit) = match matched {
                Some((hit, longform)) => {
                    // the acronym match supersedes the mention's own pick
                    mappings[index].best_candidate = Some(hit.clone());
                    mappings[index].result_entry = ResultEntry::Hit(hit.clone());
                    (longform, hit)
                }
                None => (own_best.mapped_mention.clone(), own_best),
            };

            let cluster = table.entry(key).or_default();
            if cluster.members.is_empty() {
                cluster.consensus = Some(hit);
            }
            cluster.members.push(index);
        }

        let mut clusters: Vec<MentionCluster> = table
            .into_values()
            .filter(|cluster| !cluster.members.is_empty())
            .collect();
        for cluster in &mut clusters {
            if cluster.members.len() > 1 {
                cluster.consensus = self.geometric_mean_consensus(&cluster.members, mappings);
            }
            if let Some(consensus) = cluster.consensus.clone() {
                for &member in &cluster.members {
                    mappings[member].best_candidate = Some(consensus.clone());
                    mappings[member].result_entry = ResultEntry::Hit(consensus.clone());
                }
            }
        }
        clusters
    }

    /// The highest-scored candidate of the mention whose mapped text
    /// equals either side of any acronym/long-form pair, with the long
    /// form it matched under.
    fn best_pair_match(
        &self,
        mapping: &MappingResult,
        pairs: &[(String, String)],
    ) -> Option<(CandidateHit, String)> {
        let mut matched: Option<(CandidateHit, String)> = None;
        for hit in self.candidate_list(mapping).iter().take(self.max_candidates) {
            for (acronym, longform) in pairs {
                let text = hit.mapped_mention.as_str();
                if !text.eq_ignore_ascii_case(acronym) && !text.eq_ignore_ascii_case(longform) {
                    continue;
                }
                let better = matched
                    .as_ref()
                    .map_or(true, |(best, _)| hit.mention_score > best.mention_score);
                if better {
                    matched = Some((hit.clone(), longform.clone()));
                }
            }
        }
        matched
    }

    /// Consensus over a cluster by geometric mean of mention scores.
    ///
    /// For each distinct candidate id across the members' bounded lists,
    /// the logs of its mention scores are averaged; the id with the
    /// highest mean wins. Ties go to the higher best raw score, then the
    /// lexicographically smaller id. Non-positive scores contribute
    /// nothing; when nothing contributes there is no consensus.
    fn geometric_mean_consensus(
        &self,
        members: &[usize],
        mappings: &[MappingResult],
    ) -> Option<CandidateHit> {
        struct Tally {
            log_sum: f64,
            count: usize,
            best: CandidateHit,
        }

        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
        for &member in members {
            let list = self.candidate_list(&mappings[member]);
            for hit in list.iter().take(self.max_candidates) {
                if hit.mention_score <= 0.0 {
                    continue;
                }
                let tally = tallies.entry(hit.id.clone()).or_insert_with(|| Tally {
                    log_sum: 0.0,
                    count: 0,
                    best: hit.clone(),
                });
                tally.log_sum += hit.mention_score.ln();
                tally.count += 1;
                if hit.mention_score > tally.best.mention_score {
                    tally.best = hit.clone();
                }
            }
        }

        tallies
            .into_iter()
            .map(|(id, tally)| {
                let mean = tally.log_sum / tally.count as f64;
                (id, mean, tally.best)
            })
            .max_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then_with(|| a.2.mention_score.total_cmp(&b.2.mention_score))
                    .then_with(|| b.0.cmp(&a.0))
            })
            .map(|(_, _, best)| best)
    }

    // ==================== id-overlap strategy ====================

    fn id_clusters(&self, mappings: &mut [MappingResult]) -> Vec<MentionCluster> {
        let (mut builds, ambiguous) = self.merge_id_builds(mappings);

        // Mentions merged into several clusters are ambiguous: they leave
        // every cluster and each becomes a singleton resolved against the
        // union of all ambiguous candidate lists.
        let mut union_top: Option<CandidateHit> = None;
        if !ambiguous.is_empty() {
            for build in &mut builds {
                build.members.retain(|member| !ambiguous.contains(member));
            }
            let mut union: Vec<CandidateHit> = ambiguous
                .iter()
                .flat_map(|&index| id_key(&mappings[index].filtered_candidates).into_values())
                .fold(
                    BTreeMap::<String, CandidateHit>::new(),
                    |mut best_by_id, hit| {
                        match best_by_id.get(&hit.id) {
                            Some(held) if hit.mention_score <= held.mention_score => {}
                            _ => {
                                best_by_id.insert(hit.id.clone(), hit);
                            }
                        }
                        best_by_id
                    },
                )
                .into_values()
                .collect();
            candidate::sort_by_mention_score(&mut union);
            union_top = union.into_iter().next();
        }

        let mut clusters: Vec<MentionCluster> = Vec::new();
        for build in builds {
            if build.members.is_empty() {
                continue;
            }
            let mut key_hits: Vec<CandidateHit> = build.key.into_values().collect();
            candidate::sort_by_mention_score(&mut key_hits);
            let consensus = key_hits.into_iter().next();
            assign_consensus(mappings, &build.members, consensus.as_ref());
            clusters.push(MentionCluster {
                members: build.members,
                consensus,
            });
        }
        for index in ambiguous {
            assign_consensus(mappings, &[index], union_top.as_ref());
            clusters.push(MentionCluster {
                members: vec![index],
                consensus: union_top.clone(),
            });
        }
        clusters
    }

    /// Merge mentions into id-keyed builds.
    ///
    /// Returns the builds and the indices of mentions that overlapped more
    /// than one build. Those mentions are still listed as members and have
    /// already intersected every key they touched. Keys of distinct builds
    /// never intersect: a build is only founded when its ids are disjoint
    /// from every existing key, and keys only shrink afterwards.
    fn merge_id_builds(&self, mappings: &[MappingResult]) -> (Vec<IdBuild>, Vec<usize>) {
        let mut builds: Vec<IdBuild> = Vec::new();
        let mut overlap_count = vec![0usize; mappings.len()];

        for (index, mapping) in mappings.iter().enumerate() {
            if mapping.filtered_candidates.is_empty() {
                continue;
            }
            let mention_key = id_key(&mapping.filtered_candidates);

            let matching: Vec<usize> = builds
                .iter()
                .enumerate()
                .filter(|(_, build)| build.key.keys().any(|id| mention_key.contains_key(id)))
                .map(|(build_index, _)| build_index)
                .collect();
            overlap_count[index] = matching.len();

            if matching.is_empty() {
                builds.push(IdBuild {
                    members: vec![index],
                    key: mention_key,
                });
            } else {
                for build_index in matching {
                    let build = &mut builds[build_index];
                    build.members.push(index);
                    build.key.retain(|id, _| mention_key.contains_key(id));
                    for (id, held) in build.key.iter_mut() {
                        let challenger = &mention_key[id];
                        if challenger.mention_score > held.mention_score {
                            *held = challenger.clone();
                        }
                    }
                }
            }
        }

        let ambiguous: Vec<usize> = (0..mappings.len())
            .filter(|&index| overlap_count[index] > 1)
            .collect();
        (builds, ambiguous)
    }
}

/// A cluster under construction by the id-overlap strategy.
struct IdBuild {
    members: Vec<usize>,
    // id -> best-scored instance of that id seen so far
    key: BTreeMap<String, CandidateHit>,
}

/// Best-scored instance per candidate id of a list.
fn id_key(hits: &[CandidateHit]) -> BTreeMap<String, CandidateHit> {
    let mut key: BTreeMap<String, CandidateHit> = BTreeMap::new();
    for hit in hits {
        match key.get(&hit.id) {
            Some(held) if hit.mention_score <= held.mention_score => {}
            _ => {
                key.insert(hit.id.clone(), hit.clone());
            }
        }
    }
    key
}

fn assign_consensus(
    mappings: &mut [MappingResult],
    members: &[usize],
    consensus: Option<&CandidateHit>,
) {
    let Some(consensus) = consensus else {
        return;
    };
    for &member in members {
        mappings[member].best_candidate = Some(consensus.clone());
        mappings[member].result_entry = ResultEntry::Hit(consensus.clone());
    }
}
