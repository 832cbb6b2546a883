//! Configuration system for mnemon.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{MnemonError, MnemonResult};
use crate::forgetting::ForgettingConfig;
use crate::importance::ScorerConfig;
use crate::momentum::MomentumConfig;
use crate::runtime::RuntimeConfig;
use crate::search::SearchConfig;
use crate::supersession::LearnedModelConfig;

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Importance scorer configuration.
    pub scorer: ScorerConfig,
    /// Forgetting policy configuration.
    pub forgetting: ForgettingConfig,
    /// Momentum buffer configuration.
    pub momentum: MomentumConfig,
    /// Learned supersession model configuration.
    pub supersession: LearnedModelConfig,
    /// Hybrid search configuration.
    pub search: SearchConfig,
    /// Background job configuration.
    pub runtime: RuntimeConfig,
    /// Path to the observation database.
    pub database_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mnemon_dir = dirs::home_dir()
            .map(|h| h.join(".mnemon"))
            .unwrap_or_else(|| PathBuf::from(".mnemon"));

        Self {
            scorer: ScorerConfig::default(),
            forgetting: ForgettingConfig::default(),
            momentum: MomentumConfig::default(),
            supersession: LearnedModelConfig::default(),
            search: SearchConfig::default(),
            runtime: RuntimeConfig::default(),
            database_path: mnemon_dir.join("observations.db"),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    ///
    /// Missing sections take their defaults; the result is validated.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> MnemonResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| MnemonError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| MnemonError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| MnemonError::Configuration(e.to_string()))?,
            _ => {
                return Err(MnemonError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Unparseable values are ignored and the default kept.
    pub fn from_env() -> Self {
        let mut config = Self {
            runtime: RuntimeConfig::from_env(),
            ..Self::default()
        };

        if let Ok(path) = std::env::var("MNEMON_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        // Scoring and forgetting
        if let Some(days) = env_parse::<f64>("MNEMON_HALF_LIFE_DAYS") {
            config.scorer.half_life_days = days;
            config.forgetting.age_decay_half_life = days;
        }
        if let Some(threshold) = env_parse("MNEMON_IMPORTANCE_THRESHOLD") {
            config.forgetting.importance_threshold = threshold;
        }
        if let Some(days) = env_parse("MNEMON_AGE_THRESHOLD_DAYS") {
            config.forgetting.age_threshold_days = days;
        }
        if std::env::var("MNEMON_DISABLE_ACCESS_TRACKING").is_ok() {
            config.forgetting.enable_access_tracking = false;
        }

        // Momentum
        if let Some(max) = env_parse("MNEMON_MOMENTUM_MAX_BOOSTS") {
            config.momentum.max_boosts = max;
        }
        if let Some(secs) = env_parse("MNEMON_MOMENTUM_DURATION_SECS") {
            config.momentum.default_duration_secs = secs;
        }

        // Supersession
        if let Some(enabled) = env_parse("MNEMON_LEARNED_MODEL_ENABLED") {
            config.supersession.enabled = enabled;
        }

        // Search
        if let Some(ms) = env_parse("MNEMON_VECTOR_TIMEOUT_MS") {
            config.search.vector_timeout_ms = ms;
        }
        if let Some(cap) = env_parse("MNEMON_SEARCH_BATCH_CAP") {
            config.search.batch_cap = cap;
        }

        config
    }

    /// Validate every section.
    pub fn validate(&self) -> MnemonResult<()> {
        let section = |name: &str, result: Result<(), &'static str>| {
            result.map_err(|msg| MnemonError::Configuration(format!("{name}: {msg}")))
        };

        section("scorer", self.scorer.validate())?;
        section("forgetting", self.forgetting.validate())?;
        section("momentum", self.momentum.validate())?;
        section("supersession", self.supersession.validate())?;
        section("search", self.search.validate())?;
        section("runtime", self.runtime.validate())?;
        Ok(())
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Builder for EngineConfig.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set importance scorer configuration.
    pub fn scorer(mut self, config: ScorerConfig) -> Self {
        self.config.scorer = config;
        self
    }

    /// Set forgetting policy configuration.
    pub fn forgetting(mut self, config: ForgettingConfig) -> Self {
        self.config.forgetting = config;
        self
    }

    /// Set momentum buffer configuration.
    pub fn momentum(mut self, config: MomentumConfig) -> Self {
        self.config.momentum = config;
        self
    }

    /// Set learned supersession model configuration.
    pub fn supersession(mut self, config: LearnedModelConfig) -> Self {
        self.config.supersession = config;
        self
    }

    /// Set hybrid search configuration.
    pub fn search(mut self, config: SearchConfig) -> Self {
        self.config.search = config;
        self
    }

    /// Set background runtime configuration.
    pub fn runtime(mut self, config: RuntimeConfig) -> Self {
        self.config.runtime = config;
        self
    }

    /// Set database path.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = path.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }

    /// Build and validate the configuration.
    pub fn try_build(self) -> MnemonResult<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.database_path.ends_with("observations.db"));
        assert_eq!(config.forgetting.importance_threshold, 0.2);
        assert!(!config.supersession.enabled);
    }

    #[test]
    fn test_from_toml_partial() {
        let file = write_config(
            ".toml",
            r#"
database_path = "/tmp/mnemon-test.db"

[forgetting]
age_threshold_days = 30

[momentum]
max_boosts = 8
"#,
        );

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/mnemon-test.db"));
        assert_eq!(config.forgetting.age_threshold_days, 30);
        assert_eq!(config.forgetting.importance_threshold, 0.2);
        assert_eq!(config.momentum.max_boosts, 8);
        assert_eq!(config.search.batch_cap, 100);
    }

    #[test]
    fn test_from_json_and_yaml() {
        let json = write_config(".json", r#"{"search": {"vector_timeout_ms": 250}}"#);
        let config = EngineConfig::from_file(json.path()).unwrap();
        assert_eq!(config.search.vector_timeout_ms, 250);

        let yaml = write_config(".yaml", "supersession:\n  enabled: true\n  learning_rate: 0.05\n");
        let config = EngineConfig::from_file(yaml.path()).unwrap();
        assert!(config.supersession.enabled);
        assert_eq!(config.supersession.learning_rate, 0.05);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_config(".ini", "x = 1");
        let err = EngineConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, MnemonError::Configuration(_)));
    }

    #[test]
    fn test_invalid_file_rejected() {
        let file = write_config(".toml", "[forgetting]\nimportance_threshold = 0.9\n");
        let err = EngineConfig::from_file(file.path()).unwrap_err();
        match err {
            MnemonError::Configuration(msg) => assert!(msg.starts_with("forgetting:"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::builder()
            .database_path("/tmp/builder.db")
            .momentum(MomentumConfig {
                max_boosts: 3,
                ..Default::default()
            })
            .runtime(RuntimeConfig::default().with_forgetting_interval(30))
            .build();

        assert_eq!(config.database_path, PathBuf::from("/tmp/builder.db"));
        assert_eq!(config.momentum.max_boosts, 3);
        assert!(config.runtime.enable_forgetting);
    }

    #[test]
    fn test_try_build_validates() {
        let result = EngineConfig::builder()
            .search(SearchConfig {
                batch_cap: 0,
                ..Default::default()
            })
            .try_build();
        assert!(result.is_err());
    }
}
