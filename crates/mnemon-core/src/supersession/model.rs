//! Online logistic model for supersession confidence.
//!
//! Fixed initial weights answer until enough feedback has been collected;
//! after that, weights learned by SGD with L2 regularization take over.
//! The model keeps no durable copy of its weights. Hosts persist them through
//! [`LearnedSupersessionModel::get_weights`] and restore them with
//! [`LearnedSupersessionModel::set_weights`].

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{system_clock, Clock};

use super::features::{SupersessionFeatures, FEATURE_DIM};

/// Weights are clipped to `[-WEIGHT_LIMIT, WEIGHT_LIMIT]`.
pub const WEIGHT_LIMIT: f64 = 5.0;

/// Logits are clamped to `[-LOGIT_LIMIT, LOGIT_LIMIT]` before the sigmoid.
pub const LOGIT_LIMIT: f64 = 10.0;

const LOSS_EPSILON: f64 = 1e-15;

/// Configuration for the learned supersession model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnedModelConfig {
    /// Use learned weights for prediction. Default: false
    pub enabled: bool,
    /// Collect training examples even when disabled. Default: true
    pub always_collect_data: bool,
    /// Training buffer capacity; oldest examples are evicted. Default: 1000
    pub max_training_examples: usize,
    /// SGD step size. Default: 0.01
    pub learning_rate: f64,
    /// L2 penalty. Default: 0.001
    pub regularization: f64,
    /// Examples required before learned weights are used. Default: 50
    pub min_examples_before_use: usize,
    /// Use the fixed weights until `min_examples_before_use` is reached. Default: true
    pub fallback_to_fixed: bool,
}

impl Default for LearnedModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            always_collect_data: true,
            max_training_examples: 1000,
            learning_rate: 0.01,
            regularization: 0.001,
            min_examples_before_use: 50,
            fallback_to_fixed: true,
        }
    }
}

impl LearnedModelConfig {
    /// Validate configuration values are in valid ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_training_examples == 0 {
            return Err("max_training_examples must be at least 1");
        }
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err("learning_rate must be positive");
        }
        if !(self.regularization >= 0.0) || !self.regularization.is_finite() {
            return Err("regularization must be non-negative");
        }
        Ok(())
    }
}

/// Weight vector, one weight per feature plus bias.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearnedWeights {
    pub semantic_similarity: f64,
    pub topic_match: f64,
    pub file_overlap: f64,
    pub type_match: f64,
    pub time_decay: f64,
    pub priority_boost: f64,
    pub reference_decay: f64,
    pub bias: f64,
}

impl Default for LearnedWeights {
    fn default() -> Self {
        Self::initial()
    }
}

impl LearnedWeights {
    /// Hand-tuned starting weights, also used as the fixed fallback.
    pub const fn initial() -> Self {
        Self {
            semantic_similarity: 3.0,
            topic_match: 1.0,
            file_overlap: 1.5,
            type_match: 0.5,
            time_decay: 0.5,
            priority_boost: 0.5,
            reference_decay: 0.5,
            bias: -2.5,
        }
    }

    /// Weights in feature-vector order.
    pub fn to_array(&self) -> [f64; FEATURE_DIM] {
        [
            self.semantic_similarity,
            self.topic_match,
            self.file_overlap,
            self.type_match,
            self.time_decay,
            self.priority_boost,
            self.reference_decay,
            self.bias,
        ]
    }

    /// Build weights from feature-vector order.
    pub fn from_array(w: [f64; FEATURE_DIM]) -> Self {
        Self {
            semantic_similarity: w[0],
            topic_match: w[1],
            file_overlap: w[2],
            type_match: w[3],
            time_decay: w[4],
            priority_boost: w[5],
            reference_decay: w[6],
            bias: w[7],
        }
    }

    /// Copy with every weight clipped to [-5, 5]; non-finite weights become 0.
    pub fn clamped(&self) -> Self {
        Self::from_array(self.to_array().map(clip_weight))
    }
}

fn clip_weight(w: f64) -> f64 {
    if w.is_finite() {
        w.clamp(-WEIGHT_LIMIT, WEIGHT_LIMIT)
    } else {
        0.0
    }
}

/// Which weight set produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WeightSource {
    /// Hand-tuned initial weights.
    Fixed,
    /// Weights learned from feedback.
    Learned,
}

/// Per-feature contribution (weight times normalized feature) to the logit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureContributions {
    pub semantic_similarity: f64,
    pub topic_match: f64,
    pub file_overlap: f64,
    pub type_match: f64,
    pub time_decay: f64,
    pub priority_boost: f64,
    pub reference_decay: f64,
    pub bias: f64,
}

impl FeatureContributions {
    fn from_array(c: [f64; FEATURE_DIM]) -> Self {
        Self {
            semantic_similarity: c[0],
            topic_match: c[1],
            file_overlap: c[2],
            type_match: c[3],
            time_decay: c[4],
            priority_boost: c[5],
            reference_decay: c[6],
            bias: c[7],
        }
    }

    /// Sum of contributions, the unclamped logit.
    pub fn total(&self) -> f64 {
        self.semantic_similarity
            + self.topic_match
            + self.file_overlap
            + self.type_match
            + self.time_decay
            + self.priority_boost
            + self.reference_decay
            + self.bias
    }
}

/// Supersession confidence with its explanation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Probability that the newer observation supersedes the older (0-1, exclusive).
    pub confidence: f64,
    /// Weight set used.
    pub weight_source: WeightSource,
    /// Breakdown of the logit.
    pub contributions: FeatureContributions,
}

/// One feedback example.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub features: SupersessionFeatures,
    /// Whether the supersession was accepted.
    pub label: bool,
    /// Confidence the model reported when the supersession was proposed.
    pub confidence: f64,
    /// When the feedback arrived, epoch ms.
    pub timestamp: i64,
}

/// Outcome of one training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub examples_used: usize,
    /// Weights after the epoch.
    pub weights: LearnedWeights,
    /// Mean binary cross-entropy over the epoch.
    pub loss: f64,
    /// Share of examples classified correctly at 0.5.
    pub accuracy: f64,
    /// Epoch end, epoch ms.
    pub timestamp: i64,
}

/// Summary of the training buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub total_examples: usize,
    pub positive_examples: usize,
    pub negative_examples: usize,
    /// Whether `predict` currently uses learned weights.
    pub using_learned_weights: bool,
}

/// Learns the confidence that one observation supersedes another.
///
/// Mutation goes through `&mut self`; hosts sharing a model wrap it in a
/// `tokio::sync::RwLock` so training is serialized and predictions read a
/// consistent weight snapshot.
pub struct LearnedSupersessionModel {
    config: LearnedModelConfig,
    weights: LearnedWeights,
    examples: VecDeque<TrainingExample>,
    clock: Arc<dyn Clock>,
}

impl Default for LearnedSupersessionModel {
    fn default() -> Self {
        Self::new(LearnedModelConfig::default())
    }
}

impl LearnedSupersessionModel {
    /// Create a model with initial weights and an empty buffer.
    pub fn new(config: LearnedModelConfig) -> Self {
        Self {
            config,
            weights: LearnedWeights::initial(),
            examples: VecDeque::new(),
            clock: system_clock(),
        }
    }

    /// Use a custom clock for example and training timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the model configuration.
    pub fn config(&self) -> &LearnedModelConfig {
        &self.config
    }

    /// Whether `predict` uses learned rather than fixed weights.
    pub fn uses_learned_weights(&self) -> bool {
        self.config.enabled
            && (self.examples.len() >= self.config.min_examples_before_use
                || !self.config.fallback_to_fixed)
    }

    /// Predict supersession confidence for `features`.
    pub fn predict(&self, features: &SupersessionFeatures) -> Prediction {
        let (weights, weight_source) = if self.uses_learned_weights() {
            (self.weights, WeightSource::Learned)
        } else {
            (LearnedWeights::initial(), WeightSource::Fixed)
        };

        let x = features.to_vector();
        let w = weights.to_array();
        let contributions = FeatureContributions::from_array(std::array::from_fn(|i| w[i] * x[i]));

        Prediction {
            confidence: sigmoid(contributions.total()),
            weight_source,
            contributions,
        }
    }

    /// Record feedback on a proposed supersession.
    ///
    /// Returns whether the example was kept; examples are only collected when
    /// the model is enabled or `always_collect_data` is set.
    pub fn add_training_example(
        &mut self,
        features: SupersessionFeatures,
        label: bool,
        confidence: f64,
    ) -> bool {
        if !self.config.enabled && !self.config.always_collect_data {
            return false;
        }

        self.examples.push_back(TrainingExample {
            features,
            label,
            confidence,
            timestamp: self.clock.now_ms(),
        });
        while self.examples.len() > self.config.max_training_examples.max(1) {
            self.examples.pop_front();
        }
        true
    }

    /// Run one SGD epoch over the buffer in insertion order.
    pub fn train(&mut self) -> TrainingResult {
        let timestamp = self.clock.now_ms();
        if self.examples.is_empty() {
            return TrainingResult {
                examples_used: 0,
                weights: self.weights,
                loss: 0.0,
                accuracy: 0.0,
                timestamp,
            };
        }

        let lr = self.config.learning_rate;
        let lambda = self.config.regularization;
        let mut w = self.weights.to_array();
        let mut total_loss = 0.0;
        let mut correct = 0usize;

        for example in &self.examples {
            let x = example.features.to_vector();
            let y = if example.label { 1.0 } else { 0.0 };
            let prediction = sigmoid(dot(&w, &x));

            total_loss -= y * (prediction + LOSS_EPSILON).ln()
                + (1.0 - y) * (1.0 - prediction + LOSS_EPSILON).ln();
            if (prediction >= 0.5) == example.label {
                correct += 1;
            }

            let error = prediction - y;
            for i in 0..FEATURE_DIM {
                w[i] = clip_weight(w[i] - lr * (error * x[i] + 2.0 * lambda * w[i]));
            }
        }

        self.weights = LearnedWeights::from_array(w);
        let n = self.examples.len();
        let result = TrainingResult {
            examples_used: n,
            weights: self.weights,
            loss: total_loss / n as f64,
            accuracy: correct as f64 / n as f64,
            timestamp,
        };

        info!(
            examples = n,
            loss = result.loss,
            accuracy = result.accuracy,
            "Supersession model trained"
        );
        result
    }

    /// Restore the initial weights. The training buffer is kept.
    pub fn reset_weights(&mut self) {
        debug!("Supersession weights reset");
        self.weights = LearnedWeights::initial();
    }

    /// Current learned weights.
    pub fn get_weights(&self) -> LearnedWeights {
        self.weights
    }

    /// Replace the learned weights, clipping each to [-5, 5].
    pub fn set_weights(&mut self, weights: LearnedWeights) {
        self.weights = weights.clamped();
    }

    /// Buffered examples, oldest first.
    pub fn training_examples(&self) -> impl Iterator<Item = &TrainingExample> {
        self.examples.iter()
    }

    /// Summary of the training buffer.
    pub fn training_stats(&self) -> TrainingStats {
        let positive_examples = self.examples.iter().filter(|e| e.label).count();
        TrainingStats {
            total_examples: self.examples.len(),
            positive_examples,
            negative_examples: self.examples.len() - positive_examples,
            using_learned_weights: self.uses_learned_weights(),
        }
    }
}

fn dot(w: &[f64; FEATURE_DIM], x: &[f64; FEATURE_DIM]) -> f64 {
    w.iter().zip(x.iter()).map(|(a, b)| a * b).sum()
}

fn sigmoid(logit: f64) -> f64 {
    let z = if logit.is_nan() {
        0.0
    } else {
        logit.clamp(-LOGIT_LIMIT, LOGIT_LIMIT)
    };
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn positive() -> SupersessionFeatures {
        SupersessionFeatures {
            semantic_similarity: 0.9,
            topic_match: true,
            file_overlap: 0.8,
            type_match: 1.0,
            time_delta_hours: 2.0,
            project_match: true,
            priority_score: 0.7,
            is_superseded: false,
            older_reference_count: 1,
        }
    }

    fn negative() -> SupersessionFeatures {
        SupersessionFeatures {
            semantic_similarity: 0.1,
            topic_match: false,
            file_overlap: 0.0,
            type_match: 0.0,
            time_delta_hours: 500.0,
            project_match: true,
            priority_score: 0.2,
            is_superseded: false,
            older_reference_count: 8,
        }
    }

    fn enabled(min_examples: usize) -> LearnedModelConfig {
        LearnedModelConfig {
            enabled: true,
            min_examples_before_use: min_examples,
            ..Default::default()
        }
    }

    #[test]
    fn test_fixed_weights_separate_obvious_cases() {
        let model = LearnedSupersessionModel::default();

        let high = model.predict(&positive());
        let low = model.predict(&negative());

        assert_eq!(high.weight_source, WeightSource::Fixed);
        assert!(high.confidence > 0.9);
        assert!(low.confidence < 0.1);
    }

    #[test]
    fn test_confidence_strictly_inside_unit_interval() {
        let model = LearnedSupersessionModel::default();
        let extreme = SupersessionFeatures {
            semantic_similarity: 1.0,
            topic_match: true,
            file_overlap: 1.0,
            type_match: 1.0,
            priority_score: 1.0,
            ..Default::default()
        };
        let p = model.predict(&extreme).confidence;
        assert!(p > 0.0 && p < 1.0);

        let mut heavy = LearnedSupersessionModel::new(LearnedModelConfig {
            enabled: true,
            fallback_to_fixed: false,
            ..Default::default()
        });
        heavy.set_weights(LearnedWeights::from_array([50.0; FEATURE_DIM]));
        let p = heavy.predict(&extreme).confidence;
        assert!(p < 1.0);
        assert!((p - sigmoid(LOGIT_LIMIT)).abs() < 1e-12);
    }

    #[test]
    fn test_contributions_explain_logit() {
        let model = LearnedSupersessionModel::default();
        let features = positive();
        let prediction = model.predict(&features);

        let c = prediction.contributions;
        assert!((c.semantic_similarity - 3.0 * 0.9).abs() < 1e-12);
        assert!(c.time_decay < 0.0);
        assert!(c.reference_decay < 0.0);
        assert_eq!(c.bias, -2.5);
        assert!((sigmoid(c.total()) - prediction.confidence).abs() < 1e-12);
    }

    #[test]
    fn test_weight_source_selection() {
        let mut model = LearnedSupersessionModel::new(enabled(2));
        assert_eq!(model.predict(&positive()).weight_source, WeightSource::Fixed);

        model.add_training_example(positive(), true, 0.8);
        model.add_training_example(negative(), false, 0.2);
        assert_eq!(model.predict(&positive()).weight_source, WeightSource::Learned);

        let eager = LearnedSupersessionModel::new(LearnedModelConfig {
            fallback_to_fixed: false,
            ..enabled(50)
        });
        assert_eq!(eager.predict(&positive()).weight_source, WeightSource::Learned);

        // Disabled never uses learned weights
        let mut disabled = LearnedSupersessionModel::new(LearnedModelConfig {
            min_examples_before_use: 0,
            fallback_to_fixed: false,
            ..Default::default()
        });
        disabled.add_training_example(positive(), true, 0.9);
        assert_eq!(disabled.predict(&positive()).weight_source, WeightSource::Fixed);
    }

    #[test]
    fn test_collection_gate() {
        let mut model = LearnedSupersessionModel::new(LearnedModelConfig {
            always_collect_data: false,
            ..Default::default()
        });
        assert!(!model.add_training_example(positive(), true, 0.9));
        assert_eq!(model.training_stats().total_examples, 0);

        let mut collecting = LearnedSupersessionModel::default();
        assert!(collecting.add_training_example(positive(), true, 0.9));
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut model = LearnedSupersessionModel::new(LearnedModelConfig {
            max_training_examples: 3,
            ..Default::default()
        });
        for i in 0..5 {
            let features = SupersessionFeatures {
                older_reference_count: i,
                ..positive()
            };
            model.add_training_example(features, i % 2 == 0, 0.5);
        }

        let counts: Vec<_> = model
            .training_examples()
            .map(|e| e.features.older_reference_count)
            .collect();
        assert_eq!(counts, vec![2, 3, 4]);

        let stats = model.training_stats();
        assert_eq!(stats.total_examples, 3);
        assert_eq!(stats.positive_examples, 2);
        assert_eq!(stats.negative_examples, 1);
        assert!(!stats.using_learned_weights);
    }

    #[test]
    fn test_train_empty_buffer() {
        let mut model = LearnedSupersessionModel::default();
        let result = model.train();
        assert_eq!(result.examples_used, 0);
        assert_eq!(result.weights, LearnedWeights::initial());
    }

    #[test]
    fn test_repeated_training_does_not_increase_loss() {
        let mut model = LearnedSupersessionModel::new(enabled(1));
        for _ in 0..10 {
            model.add_training_example(positive(), true, 0.8);
            model.add_training_example(negative(), false, 0.2);
        }

        let mut previous = f64::INFINITY;
        for _ in 0..10 {
            let result = model.train();
            assert_eq!(result.examples_used, 20);
            assert!(result.loss <= previous + 1e-9, "loss rose: {} -> {}", previous, result.loss);
            assert_eq!(result.accuracy, 1.0);
            previous = result.loss;
        }
    }

    #[test]
    fn test_training_learns_against_fixed_prior() {
        // Feedback says similar pairs are NOT supersessions
        let mut model = LearnedSupersessionModel::new(LearnedModelConfig {
            learning_rate: 0.5,
            ..enabled(1)
        });
        for _ in 0..20 {
            model.add_training_example(positive(), false, 0.9);
        }

        let before = model.predict(&positive()).confidence;
        for _ in 0..20 {
            model.train();
        }
        let after = model.predict(&positive()).confidence;
        assert!(after < before);
    }

    #[test]
    fn test_weights_stay_clipped() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut model = LearnedSupersessionModel::new(LearnedModelConfig {
            learning_rate: 25.0,
            ..enabled(1)
        });
        for _ in 0..200 {
            let features = SupersessionFeatures {
                semantic_similarity: rng.gen(),
                topic_match: rng.gen(),
                file_overlap: rng.gen(),
                type_match: rng.gen(),
                time_delta_hours: rng.gen_range(0.0..2_000.0),
                project_match: true,
                priority_score: rng.gen(),
                is_superseded: false,
                older_reference_count: rng.gen_range(0..20),
            };
            model.add_training_example(features, rng.gen(), 0.5);
        }

        for _ in 0..5 {
            let result = model.train();
            for w in result.weights.to_array() {
                assert!((-WEIGHT_LIMIT..=WEIGHT_LIMIT).contains(&w));
            }
        }
    }

    #[test]
    fn test_set_and_reset_weights() {
        let mut model = LearnedSupersessionModel::default();
        let mut weights = LearnedWeights::initial();
        weights.semantic_similarity = 9.0;
        weights.bias = f64::NEG_INFINITY;

        model.set_weights(weights);
        let stored = model.get_weights();
        assert_eq!(stored.semantic_similarity, 5.0);
        assert_eq!(stored.bias, 0.0);

        model.reset_weights();
        assert_eq!(model.get_weights(), LearnedWeights::initial());
    }

    #[test]
    fn test_weights_persist_by_name() {
        let json = serde_json::to_value(LearnedWeights::initial()).unwrap();
        assert_eq!(json["priority_boost"], 0.5);
        assert_eq!(json["time_decay"], 0.5);
        assert_eq!(json["bias"], -2.5);

        let mut model = LearnedSupersessionModel::default();
        let restored: LearnedWeights =
            serde_json::from_str(r#"{"semantic_similarity":2.0,"topic_match":1.0,"file_overlap":1.5,
                "type_match":0.5,"time_decay":0.5,"priority_boost":7.0,"reference_decay":0.5,"bias":-2.0}"#)
                .unwrap();
        model.set_weights(restored);
        assert_eq!(model.get_weights().priority_boost, 5.0);
        assert_eq!(model.get_weights().semantic_similarity, 2.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(LearnedModelConfig::default().validate().is_ok());
        let config = LearnedModelConfig {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
