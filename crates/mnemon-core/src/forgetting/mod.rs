//! Retention decisions and cleanup of low-value observations.

mod decision;
mod policy;

pub use decision::{
    CleanupCandidate, ForgettingResult, RetentionBucket, RetentionDecision, RetentionStats,
};
pub use policy::{
    ForgettingConfig, ForgettingPolicy, DEFAULT_STATS_LOOKBACK_DAYS, HIGH_IMPORTANCE,
    MAX_STATS_RECORDS, MODERATE_IMPORTANCE,
};
