//! Observation types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Identifier of an observation in the persistent store.
pub type ObservationId = i64;

/// Importance assumed for records that have never been scored.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

/// Kind of observation recorded by the ingestion pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ObservationType {
    Bugfix,
    Decision,
    Feature,
    Refactor,
    Discovery,
    Change,
}

impl ObservationType {
    /// Range the initial random importance is drawn from.
    ///
    /// Higher-value types get both a higher and a wider range.
    pub fn importance_range(&self) -> (f64, f64) {
        match self {
            ObservationType::Bugfix => (0.5, 0.9),
            ObservationType::Decision => (0.5, 0.85),
            ObservationType::Feature => (0.45, 0.8),
            ObservationType::Refactor => (0.4, 0.7),
            ObservationType::Change => (0.35, 0.6),
            ObservationType::Discovery => (0.3, 0.5),
        }
    }

    /// Multiplier applied to the drawn base importance.
    pub fn weight(&self) -> f64 {
        match self {
            ObservationType::Bugfix => 1.0,
            ObservationType::Decision => 1.0,
            ObservationType::Feature => 0.95,
            ObservationType::Refactor => 0.9,
            ObservationType::Change => 0.85,
            ObservationType::Discovery => 0.85,
        }
    }

    /// Deterministic base importance (range midpoint times weight).
    pub fn base_importance(&self) -> f64 {
        let (low, high) = self.importance_range();
        ((low + high) / 2.0) * self.weight()
    }
}

/// A single recorded unit of assistant memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Store identifier.
    pub id: ObservationId,
    /// Project the observation belongs to.
    pub project: String,
    /// Observation kind.
    #[serde(rename = "type")]
    pub obs_type: ObservationType,
    /// Short title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Secondary title line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Free-text narrative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Discrete facts.
    #[serde(default)]
    pub facts: Vec<String>,
    /// Concept tags.
    #[serde(default)]
    pub concepts: Vec<String>,
    /// Files read while producing the observation.
    #[serde(default)]
    pub files_read: Vec<String>,
    /// Files modified while producing the observation.
    #[serde(default)]
    pub files_modified: Vec<String>,
    /// Importance (0-1); absent means never scored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_score: Option<f64>,
    /// Novelty signal (0-1) supplied upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surprise_score: Option<f64>,
    /// Creation time in epoch milliseconds.
    pub created_at_epoch: i64,
}

impl Observation {
    /// Create a new observation with empty content.
    pub fn new(
        id: ObservationId,
        project: impl Into<String>,
        obs_type: ObservationType,
        created_at_epoch: i64,
    ) -> Self {
        Self {
            id,
            project: project.into(),
            obs_type,
            title: None,
            subtitle: None,
            narrative: None,
            facts: Vec::new(),
            concepts: Vec::new(),
            files_read: Vec::new(),
            files_modified: Vec::new(),
            importance_score: None,
            surprise_score: None,
            created_at_epoch,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the narrative.
    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = Some(narrative.into());
        self
    }

    /// Set the facts.
    pub fn with_facts(mut self, facts: Vec<String>) -> Self {
        self.facts = facts;
        self
    }

    /// Set the concept tags.
    pub fn with_concepts(mut self, concepts: Vec<String>) -> Self {
        self.concepts = concepts;
        self
    }

    /// Set files read.
    pub fn with_files_read(mut self, files: Vec<String>) -> Self {
        self.files_read = files;
        self
    }

    /// Set files modified.
    pub fn with_files_modified(mut self, files: Vec<String>) -> Self {
        self.files_modified = files;
        self
    }

    /// Set the importance score.
    pub fn with_importance(mut self, score: f64) -> Self {
        self.importance_score = Some(score);
        self
    }

    /// Set the surprise score.
    pub fn with_surprise(mut self, score: f64) -> Self {
        self.surprise_score = Some(score);
        self
    }

    /// Importance with the unscored default applied.
    pub fn importance(&self) -> f64 {
        self.importance_score.unwrap_or(DEFAULT_IMPORTANCE)
    }

    /// Title, subtitle, narrative and facts joined for topic extraction.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for field in [&self.title, &self.subtitle, &self.narrative].into_iter().flatten() {
            parts.push(field);
        }
        parts.extend(self.facts.iter().map(String::as_str));
        parts.join("\n")
    }
}
