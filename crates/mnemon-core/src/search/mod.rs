//! Hybrid metadata and semantic search.

mod fusion;
mod hybrid;

pub use fusion::fuse_ranked_ids;
pub use hybrid::{HybridSearchStrategy, SearchConfig, SearchHint, SearchOptions, SearchResponse};
