//! The automated risk-scoring policy.
//!
//! The workflow engine runs a [`RiskModel`] whenever a request enters
//! the automated review stage. The model is a trait seam so the scoring
//! policy can be swapped, mocked in tests, or replaced with a real
//! service without touching the transition code.
//!
//! [`HeuristicRiskModel`] is the reference policy: a uniform random
//! score checked against a per-sensitivity threshold. It is
//! non-deterministic by design; seed it for reproducible runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use steward_types::Sensitivity;

/// Outcome recommended by the automated assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRecommendation {
    /// Grant access.
    Approve,
    /// Deny access.
    Reject,
    /// The model declines to decide; a human must. Only reachable for
    /// high and critical sensitivity.
    ReviewRequired,
}

impl std::fmt::Display for RiskRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "APPROVE"),
            Self::Reject => write!(f, "REJECT"),
            Self::ReviewRequired => write!(f, "REVIEW_REQUIRED"),
        }
    }
}

/// Result of one automated assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Recommended outcome.
    pub recommendation: RiskRecommendation,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    /// Free-text rationale recorded on the request.
    pub analysis: String,
}

/// How the engine resolves a [`RiskRecommendation::ReviewRequired`]
/// outcome.
///
/// The reference system folded ReviewRequired into rejection, which may
/// well have been unintended; this makes the branch explicit
/// configuration instead of silently replicating it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewRequiredResolution {
    /// Resolve to rejection (reference behavior). The applicant can
    /// still appeal.
    #[default]
    AutoReject,
    /// Leave the request in automated review, pending a mandatory
    /// administrator override.
    AwaitOverride,
}

/// A replaceable risk-scoring policy.
///
/// Implementations must preserve the three-sensitivity-tier branching
/// and the Approve/Reject/ReviewRequired outcome space; everything else
/// (scoring heuristic, determinism) is up to the implementation.
pub trait RiskModel {
    /// Assess one request. `dataset` and `justification` are available
    /// for content-aware models; the reference model ignores them.
    fn assess(
        &mut self,
        sensitivity: Sensitivity,
        dataset: &str,
        justification: &str,
    ) -> RiskAssessment;
}

/// Reference scoring policy: uniform random score against a
/// per-sensitivity threshold.
///
/// | Sensitivity | Approve when | Otherwise       | Confidence   |
/// |-------------|--------------|-----------------|--------------|
/// | Critical    | score > 0.8  | ReviewRequired  | [0.7, 1.0)   |
/// | High        | score > 0.6  | ReviewRequired  | [0.6, 1.0)   |
/// | Normal      | score > 0.3  | Reject          | [0.5, 1.0)   |
#[derive(Debug)]
pub struct HeuristicRiskModel {
    rng: StdRng,
}

impl HeuristicRiskModel {
    /// Entropy-seeded model (production behavior).
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministically seeded model for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for HeuristicRiskModel {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskModel for HeuristicRiskModel {
    fn assess(
        &mut self,
        sensitivity: Sensitivity,
        _dataset: &str,
        _justification: &str,
    ) -> RiskAssessment {
        let score: f64 = self.rng.gen_range(0.0..1.0);

        let (recommendation, confidence, analysis) = match sensitivity {
            Sensitivity::Critical => (
                if score > 0.8 {
                    RiskRecommendation::Approve
                } else {
                    RiskRecommendation::ReviewRequired
                },
                self.rng.gen_range(0.7..1.0),
                "Critical sensitivity data requires high confidence approval",
            ),
            Sensitivity::High => (
                if score > 0.6 {
                    RiskRecommendation::Approve
                } else {
                    RiskRecommendation::ReviewRequired
                },
                self.rng.gen_range(0.6..1.0),
                "High sensitivity data shows moderate risk profile",
            ),
            Sensitivity::Normal => (
                if score > 0.3 {
                    RiskRecommendation::Approve
                } else {
                    RiskRecommendation::Reject
                },
                self.rng.gen_range(0.5..1.0),
                "Normal sensitivity data with standard risk assessment",
            ),
        };

        RiskAssessment {
            recommendation,
            confidence,
            analysis: analysis.to_string(),
        }
    }
}

/// A model that always returns a preset assessment.
///
/// For tests and demos where the workflow path must be controlled.
#[derive(Debug, Clone)]
pub struct FixedRiskModel {
    assessment: RiskAssessment,
}

impl FixedRiskModel {
    pub fn new(recommendation: RiskRecommendation, confidence: f64) -> Self {
        Self {
            assessment: RiskAssessment {
                recommendation,
                confidence,
                analysis: format!("Fixed outcome: {recommendation}"),
            },
        }
    }

    /// Always approve with full confidence.
    pub fn approving() -> Self {
        Self::new(RiskRecommendation::Approve, 1.0)
    }

    /// Always reject with full confidence.
    pub fn rejecting() -> Self {
        Self::new(RiskRecommendation::Reject, 1.0)
    }

    /// Always defer to a human.
    pub fn deferring() -> Self {
        Self::new(RiskRecommendation::ReviewRequired, 0.5)
    }
}

impl RiskModel for FixedRiskModel {
    fn assess(
        &mut self,
        _sensitivity: Sensitivity,
        _dataset: &str,
        _justification: &str,
    ) -> RiskAssessment {
        self.assessment.clone()
    }
}
