//! Metadata predicates and query filters for observation lookups.

use serde::{Deserialize, Serialize};

use super::observation::ObservationType;

/// Metadata predicate used to select search candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetadataPredicate {
    /// Observation carries this concept tag (exact match).
    Concept(String),
    /// Observation is of one of these types.
    Types(Vec<ObservationType>),
    /// Some read or modified path contains this substring.
    FilePath(String),
}

impl MetadataPredicate {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            MetadataPredicate::Concept(_) => "concept",
            MetadataPredicate::Types(_) => "type",
            MetadataPredicate::FilePath(_) => "file",
        }
    }
}

/// Inclusive creation-time window in epoch milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Lower bound (inclusive).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_epoch: Option<i64>,
    /// Upper bound (inclusive).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_epoch: Option<i64>,
}

impl DateRange {
    /// Create a range with both bounds.
    pub fn between(start_epoch: i64, end_epoch: i64) -> Self {
        Self {
            start_epoch: Some(start_epoch),
            end_epoch: Some(end_epoch),
        }
    }

    /// Create a range with only a lower bound.
    pub fn since(start_epoch: i64) -> Self {
        Self {
            start_epoch: Some(start_epoch),
            end_epoch: None,
        }
    }
}

/// Row returned by the low-importance query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowImportanceMemory {
    /// Observation ID.
    pub id: i64,
    /// Stored importance (0.5 when never scored).
    pub score: f64,
    /// Age in days at query time.
    pub age_days: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_serialization() {
        let predicate = MetadataPredicate::Types(vec![ObservationType::Decision]);
        let json = serde_json::to_value(&predicate).unwrap();
        assert_eq!(json["kind"], "types");
        assert_eq!(json["value"][0], "decision");
        assert_eq!(MetadataPredicate::FilePath("src/".into()).label(), "file");
    }

    #[test]
    fn test_date_range_constructors() {
        let range = DateRange::between(1_000, 2_000);
        assert_eq!((range.start_epoch, range.end_epoch), (Some(1_000), Some(2_000)));

        let open = DateRange::since(10);
        assert_eq!(open.end_epoch, None);
        assert_eq!(serde_json::to_value(open).unwrap(), serde_json::json!({"start_epoch": 10}));
    }
}
