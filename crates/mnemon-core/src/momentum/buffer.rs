//! Momentum buffer.
//!
//! Short-lived registry of boosted topics. A boost raises the effective
//! priority of a topic for a few minutes after a surprising observation;
//! readers ask for the current factor and expired entries are dropped
//! lazily on read or proactively by [`MomentumBuffer::sweep`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{system_clock, Clock};
use crate::types::{Observation, ObservationId};

use super::topics::{extract_topics, normalize_topic, DEFAULT_MAX_TOPICS};

/// Minimum factor; a factor of 1.0 means no boost.
pub const MIN_BOOST_FACTOR: f64 = 1.0;

/// A new boost must outlive the current one by more than this to replace it.
const REPLACE_EXTENSION_MS: i64 = 60_000;

/// Configuration for the momentum buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Boost lifetime when the caller gives none. Default: 300
    pub default_duration_secs: u64,
    /// Boost factor when the caller gives none. Default: 1.5
    pub default_boost_factor: f64,
    /// Upper clamp for boost factors. Default: 3.0
    pub max_boost_factor: f64,
    /// Maximum live entries. Default: 100
    pub max_boosts: usize,
    /// Period of the background sweep. Default: 60
    pub sweep_interval_secs: u64,
    /// Surprise above which an observation boosts its topics. Default: 0.7
    pub surprise_threshold: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: 300,
            default_boost_factor: 1.5,
            max_boost_factor: 3.0,
            max_boosts: 100,
            sweep_interval_secs: 60,
            surprise_threshold: 0.7,
        }
    }
}

impl MomentumConfig {
    /// Validate configuration values are in valid ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.default_duration_secs == 0 {
            return Err("default_duration_secs must be at least 1");
        }
        if !(self.max_boost_factor >= MIN_BOOST_FACTOR) {
            return Err("max_boost_factor must be at least 1.0");
        }
        if !(MIN_BOOST_FACTOR..=self.max_boost_factor).contains(&self.default_boost_factor) {
            return Err("default_boost_factor must be between 1.0 and max_boost_factor");
        }
        if self.max_boosts == 0 {
            return Err("max_boosts must be at least 1");
        }
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.surprise_threshold) {
            return Err("surprise_threshold must be between 0.0 and 1.0");
        }
        Ok(())
    }
}

/// Per-call overrides for a boost.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoostOptions {
    /// Boost lifetime; the configured default when `None`.
    pub duration: Option<Duration>,
    /// Boost factor; the configured default when `None`. Clamped to [1.0, max].
    pub boost_factor: Option<f64>,
    /// Observation that triggered the boost.
    pub source_memory_id: Option<ObservationId>,
}

impl BoostOptions {
    /// Set the boost lifetime.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set the boost factor.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.boost_factor = Some(factor);
        self
    }

    /// Set the triggering observation.
    pub fn with_source(mut self, id: ObservationId) -> Self {
        self.source_memory_id = Some(id);
        self
    }
}

/// A live boost entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTopic {
    /// Normalized topic key.
    pub topic: String,
    /// Multiplier in [1.0, max_boost_factor].
    pub boost_factor: f64,
    /// When the boost was set, epoch ms.
    pub created_at_epoch: i64,
    /// When the boost lapses, epoch ms.
    pub expires_at_epoch: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_memory_id: Option<ObservationId>,
}

impl BoostedTopic {
    fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_epoch
    }
}

/// Status of a boosted topic at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostStatus {
    /// Normalized topic key.
    pub topic: String,
    /// Current factor.
    pub boost_factor: f64,
    /// Expiry in epoch ms.
    pub expires_at_epoch: i64,
    /// Milliseconds until expiry.
    pub remaining_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_memory_id: Option<ObservationId>,
}

/// Result of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Entries dropped because they expired.
    pub expired: usize,
    /// Live entries dropped to stay under `max_boosts`.
    pub evicted: usize,
    /// Entries left after the sweep.
    pub remaining: usize,
}

/// Snapshot of buffer state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentumStats {
    /// Live boosts.
    pub active: usize,
    /// Largest live factor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strongest_factor: Option<f64>,
    /// Soonest live expiry, epoch ms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soonest_expiry_epoch: Option<i64>,
}

/// Time-boxed registry of boosted topics.
///
/// Owned by the host and shared through `Arc`; all methods take `&self`.
pub struct MomentumBuffer {
    boosts: Mutex<HashMap<String, BoostedTopic>>,
    clock: Arc<dyn Clock>,
    config: MomentumConfig,
}

impl Default for MomentumBuffer {
    fn default() -> Self {
        Self::new(MomentumConfig::default())
    }
}

impl MomentumBuffer {
    /// Create an empty buffer.
    pub fn new(config: MomentumConfig) -> Self {
        Self {
            boosts: Mutex::new(HashMap::new()),
            clock: system_clock(),
            config,
        }
    }

    /// Use a custom clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the buffer configuration.
    pub fn config(&self) -> &MomentumConfig {
        &self.config
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, BoostedTopic>> {
        // Entries stay consistent even if a holder panicked
        self.boosts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Boost `topic`. Returns whether the registry changed.
    ///
    /// A live entry is only replaced when the new boost lasts more than a
    /// minute longer or carries a strictly larger factor.
    pub fn boost(&self, topic: &str, options: BoostOptions) -> bool {
        let key = normalize_topic(topic);
        if key.is_empty() {
            return false;
        }

        let now = self.clock.now_ms();
        let duration_ms = options
            .duration
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or_else(|| {
                i64::try_from(self.config.default_duration_secs)
                    .unwrap_or(i64::MAX)
                    .saturating_mul(1000)
            });
        let requested = options.boost_factor.unwrap_or(self.config.default_boost_factor);
        let boost_factor = if requested.is_finite() {
            requested.clamp(MIN_BOOST_FACTOR, self.config.max_boost_factor)
        } else {
            MIN_BOOST_FACTOR
        };
        let candidate = BoostedTopic {
            topic: key.clone(),
            boost_factor,
            created_at_epoch: now,
            expires_at_epoch: now.saturating_add(duration_ms),
            source_memory_id: options.source_memory_id,
        };

        let mut boosts = self.entries();
        if let Some(existing) = boosts.get(&key) {
            let live = !existing.is_expired_at(now);
            let extends = candidate.expires_at_epoch
                > existing.expires_at_epoch.saturating_add(REPLACE_EXTENSION_MS);
            let stronger = candidate.boost_factor > existing.boost_factor;
            if live && !extends && !stronger {
                return false;
            }
        }

        debug!(topic = %key, boost_factor, duration_ms, "Topic boosted");
        boosts.insert(key.clone(), candidate);
        enforce_capacity(&mut boosts, now, self.config.max_boosts, Some(&key));
        true
    }

    /// Boost several topics with the same options. Returns how many changed.
    pub fn boost_many<S: AsRef<str>>(&self, topics: &[S], options: BoostOptions) -> usize {
        topics
            .iter()
            .filter(|topic| self.boost(topic.as_ref(), options))
            .count()
    }

    /// Boost the topics of a surprising observation.
    ///
    /// Does nothing unless `surprise` exceeds the configured threshold.
    /// Returns the topics that were boosted.
    pub fn boost_from_observation(&self, observation: &Observation, surprise: f64) -> Vec<String> {
        if !(surprise > self.config.surprise_threshold) {
            return Vec::new();
        }

        let mut topics: Vec<String> = observation.concepts.clone();
        topics.extend(extract_topics(&observation.searchable_text(), DEFAULT_MAX_TOPICS));

        let options = BoostOptions::default().with_source(observation.id);
        let mut boosted = Vec::new();
        for topic in topics {
            if boosted.len() >= DEFAULT_MAX_TOPICS {
                break;
            }
            let key = normalize_topic(&topic);
            if boosted.contains(&key) {
                continue;
            }
            if self.boost(&topic, options) {
                boosted.push(key);
            }
        }

        if !boosted.is_empty() {
            debug!(
                observation_id = observation.id,
                surprise,
                topics = boosted.len(),
                "Boosted topics from surprising observation"
            );
        }
        boosted
    }

    /// Live entry for `topic`, evicting it if expired.
    fn live_entry(&self, topic: &str) -> Option<BoostedTopic> {
        let key = normalize_topic(topic);
        let now = self.clock.now_ms();
        let mut boosts = self.entries();

        match boosts.get(&key) {
            Some(entry) if entry.is_expired_at(now) => {
                boosts.remove(&key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    /// Whether `topic` currently has a live boost.
    pub fn is_boosted(&self, topic: &str) -> bool {
        self.live_entry(topic).is_some()
    }

    /// Status of `topic`, `None` when not boosted.
    pub fn get_boost_status(&self, topic: &str) -> Option<BoostStatus> {
        let entry = self.live_entry(topic)?;
        Some(BoostStatus {
            remaining_ms: entry.expires_at_epoch.saturating_sub(self.clock.now_ms()).max(0),
            topic: entry.topic,
            boost_factor: entry.boost_factor,
            expires_at_epoch: entry.expires_at_epoch,
            source_memory_id: entry.source_memory_id,
        })
    }

    /// Current factor for `topic`; 1.0 when not boosted.
    pub fn get_boost_factor(&self, topic: &str) -> f64 {
        self.live_entry(topic)
            .map(|entry| entry.boost_factor)
            .unwrap_or(MIN_BOOST_FACTOR)
    }

    /// All live boosts, soonest-expiring first. Expired entries are dropped.
    pub fn get_active_boosts(&self) -> Vec<BoostedTopic> {
        let now = self.clock.now_ms();
        let mut boosts = self.entries();

        let mut live = Vec::with_capacity(boosts.len());
        let mut expired = Vec::new();
        for (key, entry) in boosts.iter() {
            if entry.is_expired_at(now) {
                expired.push(key.clone());
            } else {
                live.push(entry.clone());
            }
        }
        for key in expired {
            boosts.remove(&key);
        }

        live.sort_by_key(|entry| (entry.expires_at_epoch, entry.topic.clone()));
        live
    }

    /// Drop expired entries and trim to `max_boosts`.
    pub fn sweep(&self) -> SweepStats {
        let now = self.clock.now_ms();
        let mut boosts = self.entries();

        let before = boosts.len();
        boosts.retain(|_, entry| !entry.is_expired_at(now));
        let expired = before - boosts.len();
        let evicted = enforce_capacity(&mut boosts, now, self.config.max_boosts, None);

        let stats = SweepStats {
            expired,
            evicted,
            remaining: boosts.len(),
        };
        if expired > 0 || evicted > 0 {
            info!(expired, evicted, remaining = stats.remaining, "Momentum sweep complete");
        }
        stats
    }

    /// Remove the boost for `topic`. Returns whether one existed.
    pub fn clear(&self, topic: &str) -> bool {
        self.entries().remove(&normalize_topic(topic)).is_some()
    }

    /// Remove every boost. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let mut boosts = self.entries();
        let count = boosts.len();
        boosts.clear();
        count
    }

    /// Summary of live boosts.
    pub fn stats(&self) -> MomentumStats {
        let active = self.get_active_boosts();
        MomentumStats {
            active: active.len(),
            strongest_factor: active
                .iter()
                .map(|entry| OrderedFloat(entry.boost_factor))
                .max()
                .map(|factor| factor.into_inner()),
            soonest_expiry_epoch: active.first().map(|entry| entry.expires_at_epoch),
        }
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the buffer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Evict soonest-expiring entries until at most `max` remain.
///
/// `keep` is never evicted. Returns the number evicted.
fn enforce_capacity(
    boosts: &mut HashMap<String, BoostedTopic>,
    now: i64,
    max: usize,
    keep: Option<&str>,
) -> usize {
    if boosts.len() <= max {
        return 0;
    }

    boosts.retain(|_, entry| !entry.is_expired_at(now));
    if boosts.len() <= max {
        return 0;
    }

    let mut by_expiry: Vec<(i64, String)> = boosts
        .iter()
        .filter(|(key, _)| Some(key.as_str()) != keep)
        .map(|(key, entry)| (entry.expires_at_epoch, key.clone()))
        .collect();
    by_expiry.sort();

    let excess = boosts.len() - max;
    let mut evicted = 0;
    for (_, key) in by_expiry.into_iter().take(excess) {
        boosts.remove(&key);
        evicted += 1;
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::ObservationType;

    const NOW: i64 = 1_700_000_000_000;

    fn buffer() -> (MomentumBuffer, Arc<ManualClock>) {
        buffer_with(MomentumConfig::default())
    }

    fn buffer_with(config: MomentumConfig) -> (MomentumBuffer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        (MomentumBuffer::new(config).with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_key_normalization() {
        let (buffer, _) = buffer();
        assert!(buffer.boost("AUTH ", BoostOptions::default()));

        assert!(buffer.is_boosted("auth"));
        assert!(buffer.is_boosted("  Auth"));
        assert_eq!(buffer.len(), 1);
        assert!(!buffer.boost("   ", BoostOptions::default()));
    }

    #[test]
    fn test_factor_clamped() {
        let (buffer, _) = buffer();
        buffer.boost("hot", BoostOptions::default().with_factor(10.0));
        buffer.boost("cold", BoostOptions::default().with_factor(0.2));
        buffer.boost("nan", BoostOptions::default().with_factor(f64::NAN));

        assert_eq!(buffer.get_boost_factor("hot"), 3.0);
        assert_eq!(buffer.get_boost_factor("cold"), 1.0);
        assert_eq!(buffer.get_boost_factor("nan"), 1.0);
        assert_eq!(buffer.get_boost_factor("absent"), 1.0);
    }

    #[test]
    fn test_default_options() {
        let (buffer, _) = buffer();
        buffer.boost("auth", BoostOptions::default());

        let status = buffer.get_boost_status("auth").unwrap();
        assert_eq!(status.boost_factor, 1.5);
        assert_eq!(status.expires_at_epoch, NOW + 300_000);
        assert_eq!(status.remaining_ms, 300_000);
    }

    #[test]
    fn test_very_long_durations_saturate() {
        let (buffer, clock) = buffer();
        assert!(buffer.boost(
            "pinned",
            BoostOptions::default().with_duration(Duration::from_millis(i64::MAX as u64))
        ));
        assert!(buffer.boost("forever", BoostOptions::default().with_duration(Duration::MAX)));

        for topic in ["pinned", "forever"] {
            let status = buffer.get_boost_status(topic).unwrap();
            assert_eq!(status.expires_at_epoch, i64::MAX);
            assert_eq!(status.remaining_ms, i64::MAX - NOW);
        }

        clock.advance(365 * 86_400_000);
        assert!(buffer.is_boosted("pinned"));
        assert!(buffer.is_boosted("forever"));
        assert!(!buffer.boost("forever", BoostOptions::default().with_duration(Duration::MAX)));
    }

    #[test]
    fn test_replacement_rules() {
        let (buffer, _) = buffer();
        let five_min = Duration::from_secs(300);
        buffer.boost("auth", BoostOptions::default().with_duration(five_min).with_factor(2.0));

        // Weaker and barely longer: ignored
        let weaker = BoostOptions::default()
            .with_duration(Duration::from_secs(330))
            .with_factor(1.5);
        assert!(!buffer.boost("auth", weaker));
        assert_eq!(buffer.get_boost_factor("auth"), 2.0);

        // Weaker but more than a minute longer: replaces
        let longer = BoostOptions::default()
            .with_duration(Duration::from_secs(400))
            .with_factor(1.2);
        assert!(buffer.boost("auth", longer));
        assert_eq!(buffer.get_boost_factor("auth"), 1.2);

        // Stronger with a shorter life: replaces
        let stronger = BoostOptions::default()
            .with_duration(Duration::from_secs(10))
            .with_factor(2.5);
        assert!(buffer.boost("auth", stronger));
        assert_eq!(buffer.get_boost_factor("auth"), 2.5);
    }

    #[test]
    fn test_expired_entries_evicted_on_read() {
        let (buffer, clock) = buffer();
        buffer.boost("auth", BoostOptions::default().with_duration(Duration::from_secs(60)));

        clock.advance(59_000);
        assert!(buffer.is_boosted("auth"));

        clock.advance(1_000);
        assert!(!buffer.is_boosted("auth"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_expired_entry_is_replaced() {
        let (buffer, clock) = buffer();
        buffer.boost("auth", BoostOptions::default().with_factor(3.0));
        clock.advance(301_000);

        assert!(buffer.boost("auth", BoostOptions::default().with_factor(1.1)));
        assert_eq!(buffer.get_boost_factor("auth"), 1.1);
    }

    #[test]
    fn test_active_boosts_sorted_by_expiry() {
        let (buffer, clock) = buffer();
        buffer.boost("late", BoostOptions::default().with_duration(Duration::from_secs(600)));
        buffer.boost("soon", BoostOptions::default().with_duration(Duration::from_secs(30)));
        buffer.boost("gone", BoostOptions::default().with_duration(Duration::from_secs(5)));
        clock.advance(10_000);

        let active: Vec<_> = buffer.get_active_boosts().into_iter().map(|b| b.topic).collect();
        assert_eq!(active, vec!["soon".to_string(), "late".to_string()]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_sweep_drops_expired() {
        let (buffer, clock) = buffer();
        buffer.boost("expiring", BoostOptions::default().with_duration(Duration::from_secs(1)));
        buffer.boost("topic0", BoostOptions::default().with_duration(Duration::from_secs(100)));
        buffer.boost("topic1", BoostOptions::default().with_duration(Duration::from_secs(200)));
        clock.advance(2_000);

        let stats = buffer.sweep();
        assert_eq!(
            stats,
            SweepStats {
                expired: 1,
                evicted: 0,
                remaining: 2
            }
        );
        assert_eq!(buffer.sweep(), SweepStats { expired: 0, evicted: 0, remaining: 2 });
    }

    #[test]
    fn test_capacity_evicts_soonest_expiring() {
        let (buffer, _) = buffer_with(MomentumConfig {
            max_boosts: 2,
            ..Default::default()
        });
        buffer.boost("short", BoostOptions::default().with_duration(Duration::from_secs(10)));
        buffer.boost("long", BoostOptions::default().with_duration(Duration::from_secs(600)));
        buffer.boost("newest", BoostOptions::default().with_duration(Duration::from_secs(5)));

        assert_eq!(buffer.len(), 2);
        assert!(!buffer.is_boosted("short"));
        assert!(buffer.is_boosted("long"));
        assert!(buffer.is_boosted("newest"));
    }

    #[test]
    fn test_boost_many_and_clear() {
        let (buffer, _) = buffer();
        assert_eq!(buffer.boost_many(&["auth", "AUTH", "db"], BoostOptions::default()), 2);

        assert!(buffer.clear("Auth"));
        assert!(!buffer.clear("auth"));
        assert_eq!(buffer.clear_all(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_boost_from_observation_threshold() {
        let (buffer, _) = buffer();
        let observation = Observation::new(7, "proj", ObservationType::Discovery, NOW)
            .with_title("TokenCache misses after deploy")
            .with_concepts(vec!["caching".to_string()]);

        assert!(buffer.boost_from_observation(&observation, 0.7).is_empty());

        let boosted = buffer.boost_from_observation(&observation, 0.9);
        assert_eq!(boosted, vec!["caching".to_string(), "tokencache".to_string()]);
        let status = buffer.get_boost_status("TokenCache").unwrap();
        assert_eq!(status.source_memory_id, Some(7));
    }

    #[test]
    fn test_stats() {
        let (buffer, _) = buffer();
        assert_eq!(buffer.stats(), MomentumStats::default());

        buffer.boost("a", BoostOptions::default().with_factor(2.0).with_duration(Duration::from_secs(50)));
        buffer.boost("b", BoostOptions::default().with_factor(1.2));

        let stats = buffer.stats();
        assert_eq!(stats.active, 2);
        assert_eq!(stats.strongest_factor, Some(2.0));
        assert_eq!(stats.soonest_expiry_epoch, Some(NOW + 50_000));
    }

    #[test]
    fn test_config_validation() {
        assert!(MomentumConfig::default().validate().is_ok());
        let config = MomentumConfig {
            default_boost_factor: 4.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
