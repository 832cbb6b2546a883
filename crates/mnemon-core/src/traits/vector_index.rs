//! Semantic vector index trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MnemonError, MnemonResult};
use crate::types::ObservationId;

/// Ranked answer from the vector index, best match first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorQueryResult {
    /// Observation IDs in relevance order.
    pub ids: Vec<ObservationId>,
    /// Distances aligned with `ids` (lower is closer).
    pub distances: Vec<f64>,
}

impl VectorQueryResult {
    /// Build a result from `(id, distance)` pairs already in rank order.
    pub fn from_pairs(pairs: Vec<(ObservationId, f64)>) -> Self {
        let (ids, distances) = pairs.into_iter().unzip();
        Self { ids, distances }
    }

    /// Reject responses whose distance list does not line up with the IDs.
    pub fn validate(&self) -> MnemonResult<()> {
        if !self.distances.is_empty() && self.distances.len() != self.ids.len() {
            return Err(MnemonError::malformed_response(format!(
                "index returned {} ids but {} distances",
                self.ids.len(),
                self.distances.len()
            )));
        }
        Ok(())
    }
}

/// External semantic nearest-neighbour index over observation text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Rank up to `top_k` observations by semantic relevance to `text`.
    ///
    /// Implementations should give up after `timeout_ms`; callers also
    /// enforce the timeout on their side.
    async fn query(&self, text: &str, top_k: usize, timeout_ms: u64) -> MnemonResult<VectorQueryResult>;
}
