//! Storage adapters for observations and access history.

mod sqlite;

pub use sqlite::SqliteObservationStore;
