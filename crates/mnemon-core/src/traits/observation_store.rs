//! Persistent observation store traits.

use async_trait::async_trait;

use crate::error::MnemonResult;
use crate::types::{DateRange, LowImportanceMemory, MetadataPredicate, Observation, ObservationId};

/// Hydrates full observations from IDs.
///
/// Implemented by the primary store and by any read-only mirror (for
/// example a cloud-backed copy for hosted users). Result order is not
/// guaranteed; callers re-sort.
#[async_trait]
pub trait ObservationLookup: Send + Sync {
    /// Fetch observations for the given IDs, unknown IDs are skipped.
    async fn get_observations_by_ids(
        &self,
        ids: &[ObservationId],
        limit: Option<usize>,
    ) -> MnemonResult<Vec<Observation>>;
}

/// Core ObservationStore trait - the persistent record store the engine reads and prunes.
#[async_trait]
pub trait ObservationStore: ObservationLookup {
    /// Get a single observation.
    async fn get_observation(&self, id: ObservationId) -> MnemonResult<Option<Observation>>;

    /// Persist recomputed importance and surprise scores.
    async fn update_importance(
        &self,
        id: ObservationId,
        importance_score: f64,
        surprise_score: f64,
    ) -> MnemonResult<()>;

    /// Observations below `threshold` created more than `older_than_days` ago,
    /// ordered by score ascending then most recent first.
    async fn query_low_importance(
        &self,
        threshold: f64,
        older_than_days: u32,
        limit: usize,
    ) -> MnemonResult<Vec<LowImportanceMemory>>;

    /// Delete an observation. Deleting a missing record is not an error.
    async fn delete_observation(&self, id: ObservationId) -> MnemonResult<()>;

    /// Observations matching a metadata predicate, newest first.
    async fn query_by_metadata(
        &self,
        predicate: &MetadataPredicate,
        project: Option<&str>,
        date_range: Option<DateRange>,
        limit: usize,
    ) -> MnemonResult<Vec<Observation>>;

    /// Most recent observations of a project created at or after `since_epoch`.
    async fn recent_observations(
        &self,
        project: &str,
        since_epoch: i64,
        limit: usize,
    ) -> MnemonResult<Vec<Observation>>;
}
