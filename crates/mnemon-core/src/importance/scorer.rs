//! Importance scorer.
//!
//! Produces a 0-1 importance estimate per observation from its type,
//! semantic rarity, surprise, access frequency and age. New records are
//! scored once with a randomized type base; stored records are rescored on
//! demand with a deterministic base and exponential age decay.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{age_in_days, system_clock, Clock};
use crate::traits::{AccessTracker, ObservationStore};
use crate::types::{LowImportanceMemory, Observation, ObservationId, DEFAULT_IMPORTANCE};

use super::factors::{
    age_decay, normalize_access_frequency, ImportanceFactors, DEFAULT_SEMANTIC_RARITY,
    DEFAULT_SURPRISE, FACTOR_COUNT,
};

/// Default threshold for the low-importance candidate query.
pub const DEFAULT_LOW_IMPORTANCE_THRESHOLD: f64 = 0.3;
/// Default minimum age for the low-importance candidate query.
pub const DEFAULT_LOW_IMPORTANCE_MIN_AGE_DAYS: u32 = 90;
/// Default row limit for the low-importance candidate query.
pub const DEFAULT_LOW_IMPORTANCE_LIMIT: usize = 100;

/// Configuration for the importance scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Days for importance to halve through age alone. Default: 90
    pub half_life_days: f64,
    /// Window used when reading access frequency. Default: 30
    pub access_window_days: u32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            half_life_days: 90.0,
            access_window_days: 30,
        }
    }
}

impl ScorerConfig {
    /// Validate configuration values are in valid ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.half_life_days > 0.0) {
            return Err("half_life_days must be positive");
        }
        if self.access_window_days == 0 {
            return Err("access_window_days must be at least 1");
        }
        Ok(())
    }
}

/// Optional signals supplied when rescoring a stored observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    /// Fresh surprise signal (0-1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surprise_score: Option<f64>,
    /// Semantic rarity signal (0-1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_rarity: Option<f64>,
}

/// An importance score with its explanation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportanceResult {
    /// Final importance (0-1).
    pub score: f64,
    /// Factor breakdown.
    pub factors: ImportanceFactors,
    /// Share of factors backed by real signals rather than defaults (0-1).
    pub confidence: f64,
}

/// Computes and maintains importance scores for observations.
pub struct ImportanceScorer {
    store: Arc<dyn ObservationStore>,
    access_tracker: Option<Arc<dyn AccessTracker>>,
    clock: Arc<dyn Clock>,
    config: ScorerConfig,
}

impl ImportanceScorer {
    /// Create a scorer over `store` with default configuration.
    pub fn new(store: Arc<dyn ObservationStore>) -> Self {
        Self {
            store,
            access_tracker: None,
            clock: system_clock(),
            config: ScorerConfig::default(),
        }
    }

    /// Read access frequency from `tracker` when rescoring.
    pub fn with_access_tracker(mut self, tracker: Arc<dyn AccessTracker>) -> Self {
        self.access_tracker = Some(tracker);
        self
    }

    /// Use a custom clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a custom configuration.
    pub fn with_config(mut self, config: ScorerConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the scorer configuration.
    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score a freshly ingested observation.
    pub fn score(&self, observation: &Observation) -> ImportanceResult {
        let mut rng = rand::thread_rng();
        self.score_with_rng(observation, &mut rng)
    }

    /// Score a freshly ingested observation with a provided RNG.
    ///
    /// Useful for reproducible testing.
    pub fn score_with_rng<R: Rng>(
        &self,
        observation: &Observation,
        rng: &mut R,
    ) -> ImportanceResult {
        let obs_type = observation.obs_type;
        let (low, high) = obs_type.importance_range();
        let drawn: f64 = rng.gen_range(low..=high);

        let factors = ImportanceFactors {
            type_base: drawn * obs_type.weight(),
            semantic_rarity: DEFAULT_SEMANTIC_RARITY,
            surprise: DEFAULT_SURPRISE,
            access_frequency: 0.0,
            age_decay: 1.0,
        };

        // Only the type factor carries a real signal at ingestion time
        ImportanceResult {
            score: factors.combine(),
            factors,
            confidence: 1.0 / FACTOR_COUNT,
        }
    }

    /// Recompute and persist the importance of a stored observation.
    ///
    /// Returns `None` when the record cannot be loaded or the new score cannot
    /// be written; the failure is logged.
    pub async fn update_score(
        &self,
        id: ObservationId,
        update: ScoreUpdate,
    ) -> Option<ImportanceResult> {
        let observation = match self.store.get_observation(id).await {
            Ok(Some(observation)) => observation,
            Ok(None) => {
                debug!(observation_id = id, "Observation not found for rescoring");
                return None;
            }
            Err(e) => {
                warn!(observation_id = id, error = %e, "Failed to load observation for rescoring");
                return None;
            }
        };

        let result = self.rescore(&observation, update).await;

        if let Err(e) = self
            .store
            .update_importance(id, result.score, result.factors.surprise)
            .await
        {
            warn!(observation_id = id, error = %e, "Failed to persist importance score");
            return None;
        }

        debug!(
            observation_id = id,
            score = result.score,
            age_decay = result.factors.age_decay,
            confidence = result.confidence,
            "Importance updated"
        );
        Some(result)
    }

    /// Recompute the importance of `observation` without persisting it.
    pub async fn rescore(&self, observation: &Observation, update: ScoreUpdate) -> ImportanceResult {
        let mut real_signals = 1.0; // type

        let semantic_rarity = match update.semantic_rarity {
            Some(rarity) => {
                real_signals += 1.0;
                rarity.clamp(0.0, 1.0)
            }
            None => DEFAULT_SEMANTIC_RARITY,
        };

        let surprise = match update.surprise_score.or(observation.surprise_score) {
            Some(surprise) => {
                real_signals += 1.0;
                surprise.clamp(0.0, 1.0)
            }
            None => DEFAULT_SURPRISE,
        };

        let access_frequency = match self.access_frequency(observation.id).await {
            Some(frequency) => {
                real_signals += 1.0;
                frequency
            }
            None => 0.0,
        };

        let age_days = age_in_days(observation.created_at_epoch, self.clock.now_ms());
        let decay = age_decay(age_days, self.config.half_life_days);
        if age_days > 0.0 {
            real_signals += 1.0;
        }

        let factors = ImportanceFactors {
            type_base: observation.obs_type.base_importance(),
            semantic_rarity,
            surprise,
            access_frequency,
            age_decay: decay,
        };

        ImportanceResult {
            score: factors.combine(),
            factors,
            confidence: (real_signals / FACTOR_COUNT).clamp(0.0, 1.0),
        }
    }

    async fn access_frequency(&self, id: ObservationId) -> Option<f64> {
        let tracker = self.access_tracker.as_ref()?;
        match tracker
            .get_access_stats(id, self.config.access_window_days)
            .await
        {
            Ok(stats) => stats.map(|s| normalize_access_frequency(s.access_frequency)),
            Err(e) => {
                warn!(observation_id = id, error = %e, "Failed to read access stats");
                None
            }
        }
    }

    /// Stored importance of one observation, 0.5 when absent or unreadable.
    pub async fn get_score(&self, id: ObservationId) -> f64 {
        match self.store.get_observation(id).await {
            Ok(Some(observation)) => observation.importance(),
            Ok(None) => DEFAULT_IMPORTANCE,
            Err(e) => {
                warn!(observation_id = id, error = %e, "Failed to read importance score");
                DEFAULT_IMPORTANCE
            }
        }
    }

    /// Stored importance for many observations; missing entries default to 0.5.
    pub async fn get_scores_batch(&self, ids: &[ObservationId]) -> HashMap<ObservationId, f64> {
        let mut scores: HashMap<ObservationId, f64> =
            ids.iter().map(|id| (*id, DEFAULT_IMPORTANCE)).collect();

        match self.store.get_observations_by_ids(ids, None).await {
            Ok(observations) => {
                for observation in observations {
                    scores.insert(observation.id, observation.importance());
                }
            }
            Err(e) => {
                warn!(count = ids.len(), error = %e, "Failed to read importance scores");
            }
        }

        scores
    }

    /// Low-importance observations old enough to be forgetting candidates.
    ///
    /// Ordered by score ascending, then most recent first.
    pub async fn get_low_importance_memories(
        &self,
        threshold: f64,
        older_than_days: u32,
        limit: usize,
    ) -> Vec<LowImportanceMemory> {
        match self
            .store
            .query_low_importance(threshold, older_than_days, limit)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(threshold, older_than_days, error = %e, "Low-importance query failed");
                Vec::new()
            }
        }
    }

    /// Current time according to the scorer's clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}
