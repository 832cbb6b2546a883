//! Forgetting policy.
//!
//! Turns importance, access and age into retain/forget decisions and runs
//! the resulting cleanup. Evaluation order:
//! 1. Records younger than `age_threshold_days` are always kept.
//! 2. Importance is recomputed through the scorer (stored score on failure).
//! 3. The decision tree below is applied to the recomputed importance.
//!
//! | importance         | recent access | outcome                                  |
//! |--------------------|---------------|------------------------------------------|
//! | `>= 0.6`           | any           | retain                                   |
//! | `< threshold`      | yes / no      | retain / forget                          |
//! | `threshold..0.4`   | no            | forget once older than 1.5 half-lives    |
//! | otherwise          | any           | retain                                   |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{age_in_days, MS_PER_DAY};
use crate::importance::{ImportanceScorer, ScoreUpdate};
use crate::traits::{AccessTracker, ObservationStore};
use crate::types::{Observation, ObservationId};

use super::decision::{
    CleanupCandidate, ForgettingResult, RetentionBucket, RetentionDecision, RetentionStats,
};

/// Importance at or above which a record is always kept.
pub const HIGH_IMPORTANCE: f64 = 0.6;
/// Upper bound of the moderate band; also the candidate query ceiling.
pub const MODERATE_IMPORTANCE: f64 = 0.4;
/// Default lookback for project retention stats.
pub const DEFAULT_STATS_LOOKBACK_DAYS: u32 = 365;
/// Maximum records evaluated for project retention stats.
pub const MAX_STATS_RECORDS: usize = 500;

const YOUNG_CONFIDENCE: f64 = 0.9;
const BASE_CONFIDENCE: f64 = 0.7;
const CONFIDENCE_BONUS: f64 = 0.1;

/// Configuration for the forgetting policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgettingConfig {
    /// Importance below which an unaccessed record is forgotten. Default: 0.2
    pub importance_threshold: f64,
    /// Minimum age before a record may be forgotten. Default: 90
    pub age_threshold_days: u32,
    /// Consult the access tracker for recent use. Default: true
    pub enable_access_tracking: bool,
    /// Reserved weight for access history in decay. Range-checked, but the
    /// decision tree does not read it. Default: 0.3
    pub access_decay_weight: f64,
    /// Half-life used by the moderate-band age rule. Default: 90
    pub age_decay_half_life: f64,
    /// Window for "recently accessed". Default: 180
    pub recent_access_days: u32,
    /// Stored importance below which a record is considered for cleanup.
    /// Default: 0.4
    pub cleanup_seed_threshold: f64,
}

impl Default for ForgettingConfig {
    fn default() -> Self {
        Self {
            importance_threshold: 0.2,
            age_threshold_days: 90,
            enable_access_tracking: true,
            access_decay_weight: 0.3,
            age_decay_half_life: 90.0,
            recent_access_days: 180,
            cleanup_seed_threshold: MODERATE_IMPORTANCE,
        }
    }
}

impl ForgettingConfig {
    /// Validate configuration values are in valid ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(0.0..MODERATE_IMPORTANCE).contains(&self.importance_threshold) {
            return Err("importance_threshold must be in [0.0, 0.4)");
        }
        if !(0.0..=1.0).contains(&self.access_decay_weight) {
            return Err("access_decay_weight must be between 0.0 and 1.0");
        }
        if !(self.age_decay_half_life > 0.0) {
            return Err("age_decay_half_life must be positive");
        }
        if self.recent_access_days == 0 {
            return Err("recent_access_days must be at least 1");
        }
        if !(self.cleanup_seed_threshold > 0.0 && self.cleanup_seed_threshold <= 1.0) {
            return Err("cleanup_seed_threshold must be in (0.0, 1.0]");
        }
        if self.cleanup_seed_threshold < self.importance_threshold {
            return Err("cleanup_seed_threshold must not be below importance_threshold");
        }
        Ok(())
    }

    /// Age past which a moderately important, unaccessed record is forgotten.
    pub fn moderate_age_cutoff_days(&self) -> f64 {
        1.5 * self.age_decay_half_life
    }
}

/// Decides which observations to keep and deletes the rest.
pub struct ForgettingPolicy {
    scorer: Arc<ImportanceScorer>,
    store: Arc<dyn ObservationStore>,
    access_tracker: Option<Arc<dyn AccessTracker>>,
    config: ForgettingConfig,
}

impl ForgettingPolicy {
    /// Create a policy with default configuration.
    ///
    /// Time is read from the scorer's clock.
    pub fn new(scorer: Arc<ImportanceScorer>, store: Arc<dyn ObservationStore>) -> Self {
        Self {
            scorer,
            store,
            access_tracker: None,
            config: ForgettingConfig::default(),
        }
    }

    /// Use `tracker` to detect recent access.
    pub fn with_access_tracker(mut self, tracker: Arc<dyn AccessTracker>) -> Self {
        self.access_tracker = Some(tracker);
        self
    }

    /// Use a custom configuration.
    pub fn with_config(mut self, config: ForgettingConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the policy configuration.
    pub fn config(&self) -> &ForgettingConfig {
        &self.config
    }

    /// Apply the retention rules to already-gathered signals.
    pub fn classify(&self, age_days: f64, importance: f64, recently_accessed: bool) -> RetentionDecision {
        let config = &self.config;

        if age_days < config.age_threshold_days as f64 {
            return RetentionDecision::retain(
                format!(
                    "Memory too young to forget ({:.0} days < {} days)",
                    age_days, config.age_threshold_days
                ),
                YOUNG_CONFIDENCE,
            );
        }

        let mut confidence = BASE_CONFIDENCE;
        if recently_accessed {
            confidence += CONFIDENCE_BONUS;
        }
        if age_days > 2.0 * config.age_threshold_days as f64 {
            confidence += CONFIDENCE_BONUS;
        }
        let confidence = confidence.min(1.0);

        let decision = if importance >= HIGH_IMPORTANCE {
            RetentionDecision::retain(format!("High importance ({:.2})", importance), confidence)
        } else if importance < config.importance_threshold {
            if recently_accessed {
                RetentionDecision::retain(
                    format!("Low importance ({:.2}) but recently accessed", importance),
                    confidence,
                )
            } else {
                RetentionDecision::forget(
                    format!("Low importance ({:.2}) and no recent access", importance),
                    confidence,
                )
            }
        } else if importance < MODERATE_IMPORTANCE {
            let cutoff = config.moderate_age_cutoff_days();
            if !recently_accessed && age_days > cutoff {
                RetentionDecision::forget(
                    format!(
                        "Moderate importance ({:.2}), no recent access and older than {:.0} days",
                        importance, cutoff
                    ),
                    confidence,
                )
            } else {
                RetentionDecision::retain(
                    format!(
                        "Moderate importance ({:.2}) with recent access or under {:.0} days old",
                        importance, cutoff
                    ),
                    confidence,
                )
            }
        } else {
            RetentionDecision::retain(format!("Borderline importance ({:.2})", importance), confidence)
        };

        decision.with_importance(importance)
    }

    /// Evaluate a loaded observation.
    ///
    /// Recomputing importance persists the new score as a side effect.
    pub async fn evaluate_observation(&self, observation: &Observation) -> RetentionDecision {
        let age_days = age_in_days(observation.created_at_epoch, self.scorer.now_ms());

        if age_days < self.config.age_threshold_days as f64 {
            return self.classify(age_days, observation.importance(), false);
        }

        let importance = match self
            .scorer
            .update_score(observation.id, ScoreUpdate::default())
            .await
        {
            Some(result) => result.score,
            None => observation.importance(),
        };
        let recently_accessed = self.recently_accessed(observation.id).await;

        let decision = self.classify(age_days, importance, recently_accessed);
        debug!(
            observation_id = observation.id,
            age_days,
            importance,
            recently_accessed,
            retain = decision.should_retain,
            "Retention evaluated"
        );
        decision
    }

    /// Load and evaluate one observation, `None` when it cannot be loaded.
    pub async fn evaluate_by_id(&self, id: ObservationId) -> Option<RetentionDecision> {
        match self.store.get_observation(id).await {
            Ok(Some(observation)) => Some(self.evaluate_observation(&observation).await),
            Ok(None) => {
                debug!(observation_id = id, "Observation vanished before evaluation");
                None
            }
            Err(e) => {
                warn!(observation_id = id, error = %e, "Failed to load observation for evaluation");
                None
            }
        }
    }

    async fn recently_accessed(&self, id: ObservationId) -> bool {
        if !self.config.enable_access_tracking {
            return false;
        }
        let Some(tracker) = &self.access_tracker else {
            return false;
        };

        match tracker
            .get_access_stats(id, self.config.recent_access_days)
            .await
        {
            Ok(stats) => stats.is_some_and(|s| s.was_accessed()),
            Err(e) => {
                warn!(observation_id = id, error = %e, "Failed to read access stats");
                false
            }
        }
    }

    /// Up to `limit` observations that should be forgotten.
    ///
    /// Seeds are records whose stored importance (or the default, when
    /// unscored) is below `cleanup_seed_threshold`. A record stored above it
    /// is not considered until something rescores it lower, even if a fresh
    /// score would be low. Oversamples the seed query by 2x since some
    /// candidates are kept on evaluation.
    pub async fn get_cleanup_candidates(&self, limit: usize) -> Vec<CleanupCandidate> {
        if limit == 0 {
            return Vec::new();
        }

        let seeds = self
            .scorer
            .get_low_importance_memories(
                self.config.cleanup_seed_threshold,
                self.config.age_threshold_days,
                limit.saturating_mul(2),
            )
            .await;

        let mut candidates = Vec::with_capacity(limit);
        for seed in seeds {
            if candidates.len() >= limit {
                break;
            }
            let Some(decision) = self.evaluate_by_id(seed.id).await else {
                continue;
            };
            if decision.should_retain {
                continue;
            }
            candidates.push(CleanupCandidate {
                id: seed.id,
                importance: decision.new_importance_score.unwrap_or(seed.score),
                age_days: seed.age_days,
                reason: decision.reason,
                confidence: decision.confidence,
            });
        }

        candidates
    }

    /// Find up to `limit` candidates and delete them unless `dry_run`.
    pub async fn apply_forgetting(&self, limit: usize, dry_run: bool) -> ForgettingResult {
        let candidates = self.get_cleanup_candidates(limit).await;

        if dry_run {
            info!(candidates = candidates.len(), "Forgetting dry run complete");
            return ForgettingResult {
                deleted: 0,
                candidates,
                dry_run,
            };
        }

        let deletions = candidates
            .iter()
            .map(|candidate| self.store.delete_observation(candidate.id));
        let outcomes = futures::future::join_all(deletions).await;

        let mut deleted = 0;
        for (candidate, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(observation_id = candidate.id, error = %e, "Failed to delete observation");
                }
            }
        }

        info!(deleted, candidates = candidates.len(), "Forgetting run complete");
        ForgettingResult {
            deleted,
            candidates,
            dry_run,
        }
    }

    /// Retained/forgotten split over a project's recent observations.
    pub async fn get_project_retention_stats(
        &self,
        project: &str,
        lookback_days: u32,
    ) -> RetentionStats {
        let since = self.scorer.now_ms() - (lookback_days as f64 * MS_PER_DAY) as i64;

        let observations = match self
            .store
            .recent_observations(project, since, MAX_STATS_RECORDS)
            .await
        {
            Ok(observations) => observations,
            Err(e) => {
                warn!(project, error = %e, "Failed to load observations for retention stats");
                Vec::new()
            }
        };

        let mut retained = Vec::new();
        let mut forgotten = Vec::new();
        for observation in &observations {
            let decision = self.evaluate_observation(observation).await;
            let importance = decision
                .new_importance_score
                .unwrap_or_else(|| observation.importance());
            if decision.should_retain {
                retained.push(importance);
            } else {
                forgotten.push(importance);
            }
        }

        RetentionStats {
            project: project.to_string(),
            evaluated: observations.len(),
            retained: RetentionBucket::from_scores(&retained),
            forgotten: RetentionBucket::from_scores(&forgotten),
        }
    }
}
