//! Learned confidence that a newer observation supersedes an older one.

mod features;
mod model;

pub use features::{SupersessionFeatures, FEATURE_DIM, MAX_REFERENCE_COUNT, MAX_TIME_DELTA_HOURS};
pub use model::{
    FeatureContributions, LearnedModelConfig, LearnedSupersessionModel, LearnedWeights, Prediction,
    TrainingExample, TrainingResult, TrainingStats, WeightSource, LOGIT_LIMIT, WEIGHT_LIMIT,
};
