//! Hybrid metadata + semantic search.
//!
//! The store selects candidates by metadata, the vector index orders them,
//! and the fused order is hydrated from the store or a mirror. Any index
//! failure degrades to metadata-only results, and a failed metadata query
//! yields an empty flagged response. Search itself never fails.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MnemonError, MnemonResult};
use crate::traits::{ObservationLookup, ObservationStore, VectorIndex};
use crate::types::{DateRange, MetadataPredicate, Observation, ObservationId, ObservationType};

use super::fusion::fuse_ranked_ids;

/// Configuration for hybrid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Most candidates sent to the vector index per query. Default: 100
    pub batch_cap: usize,
    /// Vector index timeout in milliseconds. Default: 5000
    pub vector_timeout_ms: u64,
    /// Result limit when the caller gives none. Default: 20
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            batch_cap: 100,
            vector_timeout_ms: 5000,
            default_limit: 20,
        }
    }
}

impl SearchConfig {
    /// Validate configuration values are in valid ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.batch_cap == 0 {
            return Err("batch_cap must be at least 1");
        }
        if self.vector_timeout_ms == 0 {
            return Err("vector_timeout_ms must be at least 1");
        }
        if self.default_limit == 0 {
            return Err("default_limit must be at least 1");
        }
        Ok(())
    }
}

/// Caller preference for how a query is served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchHint {
    /// Hybrid only when the filters call for it.
    #[default]
    Auto,
    /// Ask for hybrid ranking explicitly.
    Hybrid,
}

/// Filters and query text for a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Free text used for semantic ranking.
    pub query: Option<String>,
    /// Exact concept tag.
    pub concept: Option<String>,
    /// Substring of a read or modified path.
    pub file_path: Option<String>,
    /// Accepted observation types.
    pub types: Vec<ObservationType>,
    pub project: Option<String>,
    pub date_range: Option<DateRange>,
    /// Result limit; the configured default when `None`.
    pub limit: Option<usize>,
    pub hint: SearchHint,
}

impl SearchOptions {
    /// Options carrying only query text.
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            query: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_concept(mut self, concept: impl Into<String>) -> Self {
        self.concept = Some(concept.into());
        self
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_types(mut self, types: Vec<ObservationType>) -> Self {
        self.types = types;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_hint(mut self, hint: SearchHint) -> Self {
        self.hint = hint;
        self
    }

    fn query_text(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Search results and how they were ranked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<Observation>,
    /// Results are in semantic order.
    pub used_vector: bool,
    /// Ranking failed and results are in store order, or the store failed
    /// and there are no results.
    pub fell_back: bool,
}

impl SearchResponse {
    fn metadata_only(results: Vec<Observation>) -> Self {
        Self {
            results,
            used_vector: false,
            fell_back: false,
        }
    }

    fn ranked(results: Vec<Observation>) -> Self {
        Self {
            results,
            used_vector: true,
            fell_back: false,
        }
    }

    fn fallback(results: Vec<Observation>) -> Self {
        Self {
            results,
            used_vector: false,
            fell_back: true,
        }
    }
}

/// Metadata filtering ranked by an external semantic index.
pub struct HybridSearchStrategy {
    store: Arc<dyn ObservationStore>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    mirror: Option<Arc<dyn ObservationLookup>>,
    config: SearchConfig,
}

impl HybridSearchStrategy {
    /// Create a strategy over `store` without a vector index.
    pub fn new(store: Arc<dyn ObservationStore>) -> Self {
        Self {
            store,
            vector_index: None,
            mirror: None,
            config: SearchConfig::default(),
        }
    }

    /// Rank candidates with `index`.
    pub fn with_vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Hydrate ranked results from `mirror` instead of the store.
    pub fn with_mirror(mut self, mirror: Arc<dyn ObservationLookup>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Use a custom configuration.
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the search configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Whether hybrid search applies to `options`.
    ///
    /// Needs a vector index plus a concept, a file path, types with query
    /// text, or an explicit hybrid hint.
    pub fn can_handle(&self, options: &SearchOptions) -> bool {
        if self.vector_index.is_none() {
            return false;
        }
        options.concept.is_some()
            || options.file_path.is_some()
            || (!options.types.is_empty() && options.query_text().is_some())
            || options.hint == SearchHint::Hybrid
    }

    /// Run the search the options call for: concept, then file, then types.
    pub async fn search(&self, options: &SearchOptions) -> SearchResponse {
        if let Some(concept) = &options.concept {
            return self.find_by_concept(concept, options).await;
        }
        if let Some(path) = &options.file_path {
            return self.find_by_file(path, options).await;
        }
        if !options.types.is_empty() {
            return self.find_by_type(&options.types, options).await;
        }

        debug!("Search without metadata filter, nothing to rank");
        SearchResponse::default()
    }

    /// Observations tagged with `concept`, ranked by the query (or the concept).
    pub async fn find_by_concept(&self, concept: &str, options: &SearchOptions) -> SearchResponse {
        let text = options.query_text().unwrap_or(concept).to_string();
        self.hybrid(MetadataPredicate::Concept(concept.to_string()), &text, options)
            .await
    }

    /// Observations of `types`, ranked by the query (or the type names).
    pub async fn find_by_type(
        &self,
        types: &[ObservationType],
        options: &SearchOptions,
    ) -> SearchResponse {
        let text = match options.query_text() {
            Some(query) => query.to_string(),
            None => types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        };
        self.hybrid(MetadataPredicate::Types(types.to_vec()), &text, options)
            .await
    }

    /// Observations touching `path`, ranked by the query (or the path).
    pub async fn find_by_file(&self, path: &str, options: &SearchOptions) -> SearchResponse {
        let text = options.query_text().unwrap_or(path).to_string();
        self.hybrid(MetadataPredicate::FilePath(path.to_string()), &text, options)
            .await
    }

    async fn hybrid(
        &self,
        predicate: MetadataPredicate,
        text: &str,
        options: &SearchOptions,
    ) -> SearchResponse {
        let limit = options.limit.unwrap_or(self.config.default_limit);
        let candidates = match self
            .store
            .query_by_metadata(&predicate, options.project.as_deref(), options.date_range, limit)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    filter = predicate.label(),
                    error = %e,
                    "Metadata query failed, returning no results"
                );
                return SearchResponse::fallback(Vec::new());
            }
        };

        if candidates.is_empty() {
            debug!(filter = predicate.label(), "No metadata candidates");
            return SearchResponse::metadata_only(candidates);
        }

        let Some(index) = &self.vector_index else {
            return SearchResponse::metadata_only(candidates);
        };

        match self.rank(index.as_ref(), text, &candidates).await {
            Ok(results) => {
                debug!(
                    filter = predicate.label(),
                    candidates = candidates.len(),
                    results = results.len(),
                    "Hybrid search ranked"
                );
                SearchResponse::ranked(results)
            }
            Err(e) if e.is_index_failure() => {
                warn!(
                    filter = predicate.label(),
                    candidates = candidates.len(),
                    error = %e,
                    "Vector ranking failed, using metadata order"
                );
                SearchResponse::fallback(candidates)
            }
            Err(e) => {
                warn!(
                    filter = predicate.label(),
                    candidates = candidates.len(),
                    error = %e,
                    "Hydrating ranked results failed, using metadata order"
                );
                SearchResponse::fallback(candidates)
            }
        }
    }

    async fn rank(
        &self,
        index: &dyn VectorIndex,
        text: &str,
        candidates: &[Observation],
    ) -> MnemonResult<Vec<Observation>> {
        let top_k = candidates.len().min(self.config.batch_cap);
        let timeout_ms = self.config.vector_timeout_ms;

        let ranking = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            index.query(text, top_k, timeout_ms),
        )
        .await
        .map_err(|_| MnemonError::timeout(timeout_ms))??;
        ranking.validate()?;

        let candidate_ids: HashSet<ObservationId> = candidates.iter().map(|o| o.id).collect();
        let ids = fuse_ranked_ids(&ranking.ids, &candidate_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.hydrate(&ids).await
    }

    /// Load `ids` and return them in that order; missing records are skipped.
    async fn hydrate(&self, ids: &[ObservationId]) -> MnemonResult<Vec<Observation>> {
        let loaded = match &self.mirror {
            Some(mirror) => mirror.get_observations_by_ids(ids, None).await?,
            None => self.store.get_observations_by_ids(ids, None).await?,
        };

        let mut by_id: HashMap<ObservationId, Observation> =
            loaded.into_iter().map(|o| (o.id, o)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}
