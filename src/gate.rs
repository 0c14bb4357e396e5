//! Trained admission gate for mapped mentions.
//!
//! After filtering and semantic scoring, an optional gate decides whether a
//! mention's best candidate is trustworthy enough to emit. Exact and
//! approximate matches get separate arms; an arm holds up to three checks,
//! a mention-level model, a candidate-level model and a semantic-score
//! threshold, each configured independently. A mention is admitted when
//! every configured check agrees; a match type without an arm admits
//! everything.
//!
//! Feature extraction is injected through [`GateFeatures`], and models
//! through [`GateModel`]; the crate ships [`LinearModel`] for
//! weight-vector models trained offline.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateHit;
use crate::error::Result;
use crate::mention::Mention;
use crate::result::MatchType;

/// Number of top-ranked candidates handed to mention-level features.
pub const MENTION_FEATURE_CANDIDATES: usize = 20;

/// Turns mentions and candidates into model feature vectors.
pub trait GateFeatures: Send + Sync {
    /// Features describing a mention together with its top-ranked
    /// candidates, semantically ordered.
    fn mention_features(&self, mention: &Mention, ranked: &[CandidateHit]) -> Vec<f64>;

    /// Features describing one candidate of a mention.
    fn candidate_features(&self, mention: &Mention, candidate: &CandidateHit) -> Vec<f64>;
}

/// A trained scoring model; negative predictions veto.
pub trait GateModel: Send + Sync {
    /// Raw model output for a feature vector.
    fn predict(&self, features: &[f64]) -> f64;
}

/// Dot-product model with bias, loadable from a JSON weight file.
///
/// Features beyond the weight vector are ignored; missing features count
/// as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    weights: Vec<f64>,
    #[serde(default)]
    bias: f64,
}

impl LinearModel {
    /// Build a model from explicit weights and bias.
    #[must_use]
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    /// Load a model from a JSON file of the form
    /// `{"weights": [...], "bias": ...}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let model = serde_json::from_reader(BufReader::new(file))?;
        Ok(model)
    }
}

impl GateModel for LinearModel {
    fn predict(&self, features: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(weight, feature)| weight * feature)
                .sum::<f64>()
    }
}

/// The checks applied to one match type.
///
/// Every check is optional and skipped while unset; an arm with no checks
/// admits everything.
#[derive(Default)]
pub struct GateArm {
    mention_model: Option<Arc<dyn GateModel>>,
    candidate_model: Option<Arc<dyn GateModel>>,
    semantic_threshold: Option<f64>,
}

impl GateArm {
    /// Create an arm with no checks configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Veto mentions whose mention-level prediction is negative.
    #[must_use]
    pub fn with_mention_model(mut self, model: Arc<dyn GateModel>) -> Self {
        self.mention_model = Some(model);
        self
    }

    /// Veto mentions whose best candidate gets a negative prediction.
    #[must_use]
    pub fn with_candidate_model(mut self, model: Arc<dyn GateModel>) -> Self {
        self.candidate_model = Some(model);
        self
    }

    /// Veto mentions whose best candidate scores below `threshold` or
    /// carries no semantic score at all.
    #[must_use]
    pub fn with_semantic_threshold(mut self, threshold: f64) -> Self {
        self.semantic_threshold = Some(threshold);
        self
    }
}

impl std::fmt::Debug for GateArm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateArm")
            .field("mention_model", &self.mention_model.is_some())
            .field("candidate_model", &self.candidate_model.is_some())
            .field("semantic_threshold", &self.semantic_threshold)
            .finish()
    }
}

/// File-based configuration for one gate arm.
///
/// Absent fields leave the matching check unconfigured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateArmConfig {
    /// Path to the mention-level model JSON file.
    #[serde(default)]
    pub mention_model: Option<PathBuf>,
    /// Path to the candidate-level model JSON file.
    #[serde(default)]
    pub candidate_model: Option<PathBuf>,
    /// Semantic-score threshold of the arm.
    #[serde(default)]
    pub semantic_threshold: Option<f64>,
}

impl GateArmConfig {
    fn load(&self) -> Result<GateArm> {
        let mut arm = GateArm::new();
        if let Some(path) = &self.mention_model {
            arm = arm.with_mention_model(Arc::new(LinearModel::from_json_file(path)?));
        }
        if let Some(path) = &self.candidate_model {
            arm = arm.with_candidate_model(Arc::new(LinearModel::from_json_file(path)?));
        }
        if let Some(threshold) = self.semantic_threshold {
            arm = arm.with_semantic_threshold(threshold);
        }
        Ok(arm)
    }
}

/// File-based gate configuration, at most one arm per match type.
///
/// Deserializable from host configuration; [`GateConfig::load`] turns it
/// into a ready [`LearnedGate`], failing fast on missing or malformed
/// model files. A match type left out admits everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Arm applied to exact matches.
    #[serde(default)]
    pub exact: Option<GateArmConfig>,
    /// Arm applied to approximate matches.
    #[serde(default)]
    pub approx: Option<GateArmConfig>,
}

impl GateConfig {
    /// Load the configured model files and assemble the gate.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO or JSON error when a model file cannot
    /// be read or parsed.
    pub fn load(self, features: Arc<dyn GateFeatures>) -> Result<LearnedGate> {
        let mut gate = LearnedGate::new(features);
        if let Some(config) = &self.exact {
            gate = gate.with_exact_arm(config.load()?);
        }
        if let Some(config) = &self.approx {
            gate = gate.with_approx_arm(config.load()?);
        }
        Ok(gate)
    }
}

/// Why the gate rejected a mention, or that it did not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Every configured check passed.
    Admit,
    /// The mention-level model vetoed.
    RejectMention,
    /// The candidate-level model vetoed the best candidate.
    RejectCandidate,
    /// The best candidate's semantic score is unset or below threshold.
    RejectSemanticScore,
}

impl GateDecision {
    /// Whether the mention passed the gate.
    #[must_use]
    pub fn is_admit(&self) -> bool {
        matches!(self, GateDecision::Admit)
    }
}

/// Per-match-type admission gate.
pub struct LearnedGate {
    features: Arc<dyn GateFeatures>,
    exact: Option<GateArm>,
    approx: Option<GateArm>,
}

impl std::fmt::Debug for LearnedGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearnedGate")
            .field("exact", &self.exact)
            .field("approx", &self.approx)
            .finish_non_exhaustive()
    }
}

impl LearnedGate {
    /// Create a gate with no arms attached; until arms are added every
    /// mention is admitted.
    #[must_use]
    pub fn new(features: Arc<dyn GateFeatures>) -> Self {
        Self {
            features,
            exact: None,
            approx: None,
        }
    }

    /// Gate exact matches through `arm`.
    #[must_use]
    pub fn with_exact_arm(mut self, arm: GateArm) -> Self {
        self.exact = Some(arm);
        self
    }

    /// Gate approximate matches through `arm`.
    #[must_use]
    pub fn with_approx_arm(mut self, arm: GateArm) -> Self {
        self.approx = Some(arm);
        self
    }

    fn arm(&self, match_type: MatchType) -> Option<&GateArm> {
        match match_type {
            MatchType::Exact => self.exact.as_ref(),
            MatchType::Approx => self.approx.as_ref(),
        }
    }

    /// Decide whether a mention's best candidate may be emitted.
    ///
    /// `ranked` is the mention's semantically ordered candidate list; only
    /// the top [`MENTION_FEATURE_CANDIDATES`] of it reach the feature
    /// extractor. The configured checks run in order and the first veto
    /// wins; unconfigured checks are skipped.
    pub fn admit(
        &self,
        mention: &Mention,
        match_type: MatchType,
        ranked: &[CandidateHit],
        best: &CandidateHit,
    ) -> GateDecision {
        let Some(arm) = self.arm(match_type) else {
            return GateDecision::Admit;
        };
        let top = &ranked[..ranked.len().min(MENTION_FEATURE_CANDIDATES)];

        if let Some(model) = &arm.mention_model {
            let mention_features = self.features.mention_features(mention, top);
            if model.predict(&mention_features) < 0.0 {
                return GateDecision::RejectMention;
            }
        }

        if let Some(model) = &arm.candidate_model {
            let candidate_features = self.features.candidate_features(mention, best);
            if model.predict(&candidate_features) < 0.0 {
                return GateDecision::RejectCandidate;
            }
        }

        if let Some(threshold) = arm.semantic_threshold {
            match best.semantic_score {
                Some(score) if score >= threshold => {}
                _ => return GateDecision::RejectSemanticScore,
            }
        }

        GateDecision::Admit
    }
}
