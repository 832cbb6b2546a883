//! mnemon-core - Adaptive retention for agent observation memory.
//!
//! This crate scores how much each stored observation matters, decides which
//! ones to forget, keeps short-lived topic boosts, learns when a newer
//! observation supersedes an older one, and serves hybrid metadata and
//! semantic search over the store.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mnemon_core::{
//!     ForgettingPolicy, ImportanceScorer, MomentumBuffer, SqliteObservationStore,
//! };
//!
//! let store = Arc::new(SqliteObservationStore::new("observations.db")?);
//! let scorer = Arc::new(ImportanceScorer::new(store.clone()).with_access_tracker(store.clone()));
//! let policy = ForgettingPolicy::new(scorer, store.clone()).with_access_tracker(store.clone());
//!
//! // Preview what would be forgotten
//! let preview = policy.apply_forgetting(100, true).await;
//!
//! // Boost topics from a surprising observation
//! let momentum = MomentumBuffer::default();
//! let boosted = momentum.boost_from_observation(&observation, 0.8);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod forgetting;
pub mod importance;
pub mod momentum;
pub mod runtime;
pub mod search;
pub mod store;
pub mod supersession;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{MnemonError, MnemonResult};
pub use forgetting::{
    CleanupCandidate, ForgettingConfig, ForgettingPolicy, ForgettingResult, RetentionDecision,
    RetentionStats,
};
pub use importance::{ImportanceFactors, ImportanceResult, ImportanceScorer, ScoreUpdate, ScorerConfig};
pub use momentum::{BoostOptions, BoostStatus, BoostedTopic, MomentumBuffer, MomentumConfig};
pub use runtime::{BackgroundRuntime, RuntimeConfig};
pub use search::{HybridSearchStrategy, SearchConfig, SearchHint, SearchOptions, SearchResponse};
pub use store::SqliteObservationStore;
pub use supersession::{
    LearnedModelConfig, LearnedSupersessionModel, LearnedWeights, Prediction,
    SupersessionFeatures, TrainingExample, TrainingResult,
};
pub use traits::{AccessStats, AccessTracker, ObservationLookup, ObservationStore, VectorIndex};
pub use types::{
    DateRange, LowImportanceMemory, MetadataPredicate, Observation, ObservationId, ObservationType,
};
