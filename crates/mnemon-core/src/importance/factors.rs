//! Importance factor blending.
//!
//! The blend is a chain of fixed-ratio mixes followed by an age multiplier:
//!
//! ```text
//! s = base * 0.7 + rarity * 0.3
//! s = s * 0.8 + surprise * 0.2
//! s = s * 0.9 + access * 0.1
//! s = clamp(s * age_decay, 0, 1)
//! ```

use serde::{Deserialize, Serialize};

/// Semantic rarity assumed when no rarity signal is supplied.
pub const DEFAULT_SEMANTIC_RARITY: f64 = 0.5;

/// Surprise assumed when neither caller nor record supplies one.
pub const DEFAULT_SURPRISE: f64 = 0.5;

/// Number of factors that feed the confidence ratio.
pub const FACTOR_COUNT: f64 = 5.0;

const RARITY_MIX: f64 = 0.3;
const SURPRISE_MIX: f64 = 0.2;
const ACCESS_MIX: f64 = 0.1;

/// Breakdown of the signals behind an importance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportanceFactors {
    /// Type-derived base importance (drawn or midpoint, times type weight).
    pub type_base: f64,
    /// Semantic rarity (0-1).
    pub semantic_rarity: f64,
    /// Surprise (0-1).
    pub surprise: f64,
    /// Normalized access frequency (0-1).
    pub access_frequency: f64,
    /// Age multiplier (0-1, 1.0 for a new record).
    pub age_decay: f64,
}

impl ImportanceFactors {
    /// Blend the factors into a clamped importance score.
    pub fn combine(&self) -> f64 {
        combine_factors(
            self.type_base,
            self.semantic_rarity,
            self.surprise,
            self.access_frequency,
            self.age_decay,
        )
    }
}

/// Blend factor values into an importance score in [0, 1].
pub fn combine_factors(
    type_base: f64,
    semantic_rarity: f64,
    surprise: f64,
    access_frequency: f64,
    age_decay: f64,
) -> f64 {
    let mut score = type_base * (1.0 - RARITY_MIX) + semantic_rarity.clamp(0.0, 1.0) * RARITY_MIX;
    score = score * (1.0 - SURPRISE_MIX) + surprise.clamp(0.0, 1.0) * SURPRISE_MIX;
    score = score * (1.0 - ACCESS_MIX) + access_frequency.clamp(0.0, 1.0) * ACCESS_MIX;
    score *= age_decay.clamp(0.0, 1.0);

    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Exponential half-life decay: `exp(-ln2 * age_days / half_life_days)`.
///
/// A non-positive half-life disables decay.
pub fn age_decay(age_days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return 1.0;
    }
    (-std::f64::consts::LN_2 * age_days.max(0.0) / half_life_days).exp()
}

/// Squash an accesses-per-day frequency into [0, 1].
pub fn normalize_access_frequency(frequency: f64) -> f64 {
    if frequency.is_finite() {
        frequency.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_decay_half_life() {
        assert!((age_decay(0.0, 90.0) - 1.0).abs() < 1e-12);
        assert!((age_decay(90.0, 90.0) - 0.5).abs() < 1e-12);
        assert!((age_decay(180.0, 90.0) - 0.25).abs() < 1e-12);
        assert_eq!(age_decay(1_000.0, 0.0), 1.0);
    }

    #[test]
    fn test_combine_known_values() {
        // 0.7*0.7 + 0.5*0.3 = 0.64; *0.8 + 0.1 = 0.612; *0.9 + 0 = 0.5508
        let score = combine_factors(0.7, 0.5, 0.5, 0.0, 1.0);
        assert!((score - 0.5508).abs() < 1e-9);
    }

    #[test]
    fn test_combine_range_invariant() {
        let values = [-3.0, 0.0, 0.25, 0.5, 1.0, 7.5, f64::INFINITY];
        for &base in &values {
            for &other in &values {
                let score = combine_factors(base, other, other, other, other);
                assert!((0.0..=1.0).contains(&score), "score {score} out of range");
            }
        }
        assert_eq!(combine_factors(f64::NAN, 0.5, 0.5, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_access_normalization() {
        assert_eq!(normalize_access_frequency(3.0), 1.0);
        assert_eq!(normalize_access_frequency(-1.0), 0.0);
        assert_eq!(normalize_access_frequency(f64::NAN), 0.0);
        assert!((normalize_access_frequency(0.25) - 0.25).abs() < 1e-12);
    }
}
