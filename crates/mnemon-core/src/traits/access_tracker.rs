//! Access tracker trait and related types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MnemonResult;
use crate::types::ObservationId;

/// Usage statistics for one observation over a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccessStats {
    /// Number of recorded accesses inside the window.
    pub access_count: u64,
    /// Accesses per day inside the window.
    pub access_frequency: f64,
    /// Most recent access in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_epoch: Option<i64>,
}

impl AccessStats {
    /// Whether the observation was read at least once in the window.
    pub fn was_accessed(&self) -> bool {
        self.access_count > 0 || self.access_frequency > 0.0
    }
}

/// Supplies recent access statistics per observation.
#[async_trait]
pub trait AccessTracker: Send + Sync {
    /// Access statistics over the last `window_days`, `None` when never accessed.
    async fn get_access_stats(
        &self,
        id: ObservationId,
        window_days: u32,
    ) -> MnemonResult<Option<AccessStats>>;

    /// Record one access at the current time.
    async fn record_access(&self, id: ObservationId) -> MnemonResult<()>;
}
