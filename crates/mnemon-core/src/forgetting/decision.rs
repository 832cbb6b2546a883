//! Retention decisions and forgetting results.

use serde::{Deserialize, Serialize};

use crate::types::ObservationId;

/// Outcome of evaluating one observation for retention.
///
/// Never persisted; recomputed on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionDecision {
    /// Whether the observation should be kept.
    pub should_retain: bool,
    /// Human-readable explanation.
    pub reason: String,
    /// Confidence in the decision (0-1).
    pub confidence: f64,
    /// Importance recomputed during evaluation, when one was computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_importance_score: Option<f64>,
}

impl RetentionDecision {
    pub(crate) fn retain(reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            should_retain: true,
            reason: reason.into(),
            confidence,
            new_importance_score: None,
        }
    }

    pub(crate) fn forget(reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            should_retain: false,
            reason: reason.into(),
            confidence,
            new_importance_score: None,
        }
    }

    pub(crate) fn with_importance(mut self, score: f64) -> Self {
        self.new_importance_score = Some(score);
        self
    }
}

/// An observation selected for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupCandidate {
    /// Observation ID.
    pub id: ObservationId,
    /// Importance used for the decision.
    pub importance: f64,
    /// Age in days at evaluation time.
    pub age_days: f64,
    /// Why it should be forgotten.
    pub reason: String,
    /// Confidence of the forget decision.
    pub confidence: f64,
}

/// Result of a forgetting run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgettingResult {
    /// Number of observations actually deleted (always 0 for a dry run).
    pub deleted: usize,
    /// Candidates considered, with their reasons.
    pub candidates: Vec<CleanupCandidate>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Count and mean importance for one side of a retention split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionBucket {
    /// Observations in this bucket.
    pub count: usize,
    /// Mean importance across the bucket (0 when empty).
    pub mean_importance: f64,
}

impl RetentionBucket {
    pub(crate) fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        Self {
            count: scores.len(),
            mean_importance: scores.iter().sum::<f64>() / scores.len() as f64,
        }
    }
}

/// Retention breakdown for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionStats {
    /// Project the stats were computed for.
    pub project: String,
    /// Observations evaluated.
    pub evaluated: usize,
    /// Observations that would be kept.
    pub retained: RetentionBucket,
    /// Observations that would be forgotten.
    pub forgotten: RetentionBucket,
}
