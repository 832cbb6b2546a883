//! Seams for the engine's external collaborators.

mod access_tracker;
mod observation_store;
mod vector_index;

pub use access_tracker::*;
pub use observation_store::*;
pub use vector_index::*;
