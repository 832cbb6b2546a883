//! Short-term topic momentum.

mod buffer;
mod topics;

pub use buffer::{
    BoostOptions, BoostStatus, BoostedTopic, MomentumBuffer, MomentumConfig, MomentumStats,
    SweepStats, MIN_BOOST_FACTOR,
};
pub use topics::{extract_topics, normalize_topic, DEFAULT_MAX_TOPICS, MAX_TOPIC_CHARS};
