//! Supersession features and their normalized vector form.

use serde::{Deserialize, Serialize};

/// Time delta at which the time-decay feature saturates.
pub const MAX_TIME_DELTA_HOURS: f64 = 720.0;

/// Reference count at which the reference-decay feature saturates.
pub const MAX_REFERENCE_COUNT: f64 = 10.0;

/// Length of the feature vector, bias term included.
pub const FEATURE_DIM: usize = 8;

/// Signals describing whether a newer observation supersedes an older one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SupersessionFeatures {
    /// Semantic similarity of the pair (0-1).
    pub semantic_similarity: f64,
    /// Both observations share a topic.
    pub topic_match: bool,
    /// Overlap of touched files (0-1).
    pub file_overlap: f64,
    /// Agreement of observation types (0-1).
    pub type_match: f64,
    /// Hours between the two observations.
    pub time_delta_hours: f64,
    /// Same project; always true for pairs considered here.
    pub project_match: bool,
    /// Upstream priority of the newer observation (0-1).
    pub priority_score: f64,
    /// The older observation is already superseded.
    pub is_superseded: bool,
    /// How often the older observation is referenced (>= 0).
    pub older_reference_count: u32,
}

impl SupersessionFeatures {
    /// `ln(1 + h) / ln(1 + 720)` with `h` capped at 720 hours.
    pub fn normalized_time_delta(&self) -> f64 {
        log_normalize(self.time_delta_hours, MAX_TIME_DELTA_HOURS)
    }

    /// `ln(1 + c) / ln(1 + 10)` with `c` capped at 10 references.
    pub fn normalized_reference_count(&self) -> f64 {
        log_normalize(self.older_reference_count as f64, MAX_REFERENCE_COUNT)
    }

    /// Feature vector in weight order.
    ///
    /// Decay features enter negated so positive weights pull confidence down;
    /// the last slot is the constant bias input.
    pub fn to_vector(&self) -> [f64; FEATURE_DIM] {
        [
            unit(self.semantic_similarity),
            if self.topic_match { 1.0 } else { 0.0 },
            unit(self.file_overlap),
            unit(self.type_match),
            -self.normalized_time_delta(),
            unit(self.priority_score),
            -self.normalized_reference_count(),
            1.0,
        ]
    }
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn log_normalize(value: f64, cap: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    value.min(cap).ln_1p() / cap.ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_delta_normalization() {
        let at = |hours| SupersessionFeatures {
            time_delta_hours: hours,
            ..Default::default()
        };
        assert_eq!(at(0.0).normalized_time_delta(), 0.0);
        assert_eq!(at(-5.0).normalized_time_delta(), 0.0);
        assert!((at(720.0).normalized_time_delta() - 1.0).abs() < 1e-12);
        assert!((at(10_000.0).normalized_time_delta() - 1.0).abs() < 1e-12);

        let day = at(24.0).normalized_time_delta();
        assert!(day > 0.0 && day < 1.0);
    }

    #[test]
    fn test_reference_count_normalization() {
        let refs = |count| SupersessionFeatures {
            older_reference_count: count,
            ..Default::default()
        };
        assert_eq!(refs(0).normalized_reference_count(), 0.0);
        assert!((refs(10).normalized_reference_count() - 1.0).abs() < 1e-12);
        assert!((refs(500).normalized_reference_count() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_vector_layout() {
        let features = SupersessionFeatures {
            semantic_similarity: 1.7,
            topic_match: true,
            file_overlap: 0.5,
            type_match: 1.0,
            time_delta_hours: 720.0,
            project_match: true,
            priority_score: f64::NAN,
            is_superseded: false,
            older_reference_count: 10,
        };

        let x = features.to_vector();
        assert_eq!(x[0], 1.0);
        assert_eq!(x[1], 1.0);
        assert_eq!(x[2], 0.5);
        assert!((x[4] + 1.0).abs() < 1e-12);
        assert_eq!(x[5], 0.0);
        assert!((x[6] + 1.0).abs() < 1e-12);
        assert_eq!(x[7], 1.0);
    }
}
