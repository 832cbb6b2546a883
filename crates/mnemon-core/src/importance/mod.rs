//! Importance scoring.
//!
//! Blends type, semantic rarity, surprise, access frequency and age into a
//! single 0-1 importance score that drives retention decisions.

mod factors;
mod scorer;

pub use factors::{
    age_decay, combine_factors, normalize_access_frequency, ImportanceFactors,
    DEFAULT_SEMANTIC_RARITY, DEFAULT_SURPRISE,
};
pub use scorer::{
    ImportanceResult, ImportanceScorer, ScoreUpdate, ScorerConfig, DEFAULT_LOW_IMPORTANCE_LIMIT,
    DEFAULT_LOW_IMPORTANCE_MIN_AGE_DAYS, DEFAULT_LOW_IMPORTANCE_THRESHOLD,
};
